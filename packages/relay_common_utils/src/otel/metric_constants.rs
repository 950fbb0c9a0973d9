// prefix meters with the service that owns them: gateway_ or credit_score_

pub const METRIC_METER_NAME_GATEWAY: &str = "gateway_broker";
pub const METRIC_METER_NAME_CREDIT_SCORE: &str = "credit_score_broker";

// banking gateway: requests handled and acknowledged by the receive loop
pub const METRIC_NAME_GATEWAY_REQUESTS_PROCESSED: &str = "total_requests_processed";
// credit score service: forwarded banking requests and served score requests
pub const METRIC_NAME_BANKING_REQUESTS_PROCESSED: &str = "total_banking_requests_processed";
pub const METRIC_NAME_CREDIT_SCORE_REQUESTS_PROCESSED: &str = "total_credit_score_requests_processed";

pub const METRIC_KEY_QUEUE: &str = "queue";
