use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::db::models::TestAttempt;
use crate::db::types::AttemptStatus;
use crate::schemas::test::TestSummaryResponse;
use crate::services::grading::round2;

/// Aggregates completed (submitted or graded) attempts. Every figure is zero
/// when nothing qualifies.
pub(crate) fn summarize(test_id: &str, attempts: &[TestAttempt]) -> TestSummaryResponse {
    let completed: Vec<&TestAttempt> = attempts
        .iter()
        .filter(|attempt| {
            attempt.test_id == test_id
                && matches!(attempt.status, AttemptStatus::Submitted | AttemptStatus::Graded)
        })
        .collect();

    let students: HashSet<&str> =
        completed.iter().map(|attempt| attempt.student_id.as_str()).collect();
    let percentages: Vec<Decimal> =
        completed.iter().filter_map(|attempt| attempt.percentage).collect();

    let (average, highest, lowest) = if percentages.is_empty() {
        (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
    } else {
        let total: Decimal = percentages.iter().copied().sum();
        let average = round2(total / Decimal::from(percentages.len() as u64));
        let highest = percentages.iter().copied().max().unwrap_or(Decimal::ZERO);
        let lowest = percentages.iter().copied().min().unwrap_or(Decimal::ZERO);
        (average, highest, lowest)
    };

    let passed_count =
        completed.iter().filter(|attempt| attempt.passed == Some(true)).count() as i64;
    let failed_count =
        completed.iter().filter(|attempt| attempt.passed == Some(false)).count() as i64;
    let decided = passed_count + failed_count;
    let pass_rate = if decided == 0 {
        Decimal::ZERO
    } else {
        round2(Decimal::from(passed_count) * Decimal::ONE_HUNDRED / Decimal::from(decided))
    };

    TestSummaryResponse {
        test_id: test_id.to_string(),
        total_attempts: completed.len() as i64,
        unique_students: students.len() as i64,
        average_percentage: average,
        highest_percentage: highest,
        lowest_percentage: lowest,
        passed_count,
        failed_count,
        pass_rate,
    }
}
