//! Letter grade for a finished load test, from average latency and
//! success rate.

use crate::types::LoadTestResult;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
    #[serde(rename = "N/A")]
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeColor {
    Green,
    Yellow,
    Orange,
    Red,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PerformanceGrade {
    pub grade: Grade,
    #[serde(rename = "gradeColor")]
    pub color: GradeColor,
}

impl PerformanceGrade {
    pub fn for_result(result: &LoadTestResult) -> Self {
        if result.total_requests == 0 || result.error.is_some() {
            return Self::new(Grade::NotApplicable, GradeColor::Gray);
        }

        let latency = result.avg_latency_ms;
        let success = result.success_rate_percent;

        if latency < 200.0 && success >= 100.0 {
            Self::new(Grade::A, GradeColor::Green)
        } else if latency < 500.0 && success > 95.0 {
            Self::new(Grade::B, GradeColor::Green)
        } else if latency < 1000.0 && success > 90.0 {
            Self::new(Grade::C, GradeColor::Yellow)
        } else if latency < 2000.0 && success > 80.0 {
            Self::new(Grade::D, GradeColor::Orange)
        } else {
            Self::new(Grade::F, GradeColor::Red)
        }
    }

    fn new(grade: Grade, color: GradeColor) -> Self {
        Self { grade, color }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(avg_latency_ms: f64, success_rate_percent: f64) -> LoadTestResult {
        LoadTestResult {
            total_requests: 100,
            avg_latency_ms,
            success_rate_percent,
            ..Default::default()
        }
    }

    fn grade(avg: f64, success: f64) -> Grade {
        PerformanceGrade::for_result(&result(avg, success)).grade
    }

    #[test]
    fn grade_table() {
        assert_eq!(grade(120.0, 100.0), Grade::A);
        assert_eq!(grade(120.0, 99.0), Grade::B);
        assert_eq!(grade(200.0, 100.0), Grade::B);
        assert_eq!(grade(499.9, 95.1), Grade::B);
        assert_eq!(grade(600.0, 95.0), Grade::C);
        assert_eq!(grade(1500.0, 91.0), Grade::D);
        assert_eq!(grade(1500.0, 80.0), Grade::F);
        assert_eq!(grade(2500.0, 100.0), Grade::F);
    }

    #[test]
    fn empty_or_failed_run_is_not_graded() {
        let empty = PerformanceGrade::for_result(&LoadTestResult::default());
        assert_eq!(empty.grade, Grade::NotApplicable);
        assert_eq!(empty.color, GradeColor::Gray);

        let failed = PerformanceGrade::for_result(&LoadTestResult::setup_failure("bad url"));
        assert_eq!(failed.grade, Grade::NotApplicable);
    }

    #[test]
    fn serializes_like_the_ui_expects() {
        let value = serde_json::to_value(PerformanceGrade::for_result(&result(10.0, 100.0))).unwrap();
        assert_eq!(value, serde_json::json!({"grade": "A", "gradeColor": "green"}));

        let value = serde_json::to_value(PerformanceGrade::for_result(&LoadTestResult::default())).unwrap();
        assert_eq!(value["grade"], "N/A");
    }
}
