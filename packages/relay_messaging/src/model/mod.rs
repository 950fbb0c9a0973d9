mod envelope;
mod request;
mod response;

pub use envelope::Envelope;
pub use request::{is_awaited, BankingRequest, AWAITED_CORRELATION_PREFIX};
pub use response::{BankingScores, CreditScore, MonthlyScores, ResponseEnvelope, YearlyScores};
