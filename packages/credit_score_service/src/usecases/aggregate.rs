use relay_messaging::{
    errors::BrokerError,
    model::{BankingScores, CreditScore, ResponseEnvelope, YearlyScores},
};

/// Sum of every monthly score of every year.
pub fn aggregate_scores(scores: &YearlyScores) -> f64 {
    scores.values().flat_map(|monthly| monthly.values()).map(|score| *score as f64).sum()
}

/// The score answer for `scores`, keeping its user, trace context and correlation id.
pub fn credit_score_envelope(scores: &BankingScores, score: f64) -> Result<ResponseEnvelope, BrokerError> {
    ResponseEnvelope::from_view(&CreditScore {
        score: score as i64,
        user_id: Some(scores.user_id.clone()),
        tracing_information: scores.tracing_information.clone(),
        correlation_id: scores.correlation_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_messaging::model::BankingScores;

    #[test]
    fn test_aggregate_sums_across_years_and_months() {
        let scores: BankingScores = serde_json::from_str(
            r#"{
                "userId": "reus",
                "bankingInstitutionId": "bank-a",
                "scores": {"2015": {"January": 100, "February": -50}, "2016": {"January": 10}}
            }"#,
        )
        .unwrap();

        assert_eq!(aggregate_scores(&scores.scores), 60.0);
    }

    #[test]
    fn test_credit_score_envelope_keeps_identity() {
        let mut scores = BankingScores {
            user_id: "reus".into(),
            banking_institution_id: "bank-a".into(),
            tracing_information: Default::default(),
            scores: YearlyScores::new(),
            correlation_id: Some("c-1".into()),
        };
        scores
            .tracing_information
            .insert("traceparent".into(), "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".into());

        let credit_score: CreditScore = credit_score_envelope(&scores, -12.0).unwrap().view().unwrap();

        assert_eq!(credit_score.score, -12);
        assert_eq!(credit_score.user_id.as_deref(), Some("reus"));
        assert_eq!(credit_score.correlation_id.as_deref(), Some("c-1"));
        assert_eq!(credit_score.tracing_information, scores.tracing_information);
    }

    #[test]
    fn test_aggregate_of_nothing_is_zero() {
        assert_eq!(aggregate_scores(&YearlyScores::new()), 0.0);
    }
}
