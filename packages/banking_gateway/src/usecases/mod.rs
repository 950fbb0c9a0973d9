mod query_banking_institution;

pub use query_banking_institution::QueryBankingInstitution;
