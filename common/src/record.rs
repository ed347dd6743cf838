use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    kv::Fields,
    layout::{DomainLayout, planner_short_name},
};

const DOMAIN: &str = "domain";
const PB_INDEX: &str = "pbIndex";
const PLANNER: &str = "planner";
const PLAN_LENGTH: &str = "planLength";
const TIME_SPENT: &str = "timeSpent";

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value `{value}` for field `{key}`")]
    InvalidValue { key: &'static str, value: String },
}

/// Variable of a [`ResultRecord`] that can be plotted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variable {
    PlanLength,
    TimeSpent,
    Other(String),
}

impl Variable {
    pub fn name(&self) -> &str {
        match self {
            Variable::PlanLength => PLAN_LENGTH,
            Variable::TimeSpent => TIME_SPENT,
            Variable::Other(name) => name,
        }
    }

    /// Axis label, with units where they apply.
    pub fn label(&self) -> String {
        match self {
            Variable::TimeSpent => format!("{TIME_SPENT} (seconds)"),
            other => other.name().to_owned(),
        }
    }
}

impl From<&str> for Variable {
    fn from(name: &str) -> Self {
        match name {
            PLAN_LENGTH => Variable::PlanLength,
            TIME_SPENT => Variable::TimeSpent,
            other => Variable::Other(other.to_owned()),
        }
    }
}

/// Outcome of one planner run on one problem file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Path to the domain file
    pub domain: String,
    pub problem_index: u32,
    pub planner: String,
    pub plan_length: u64,
    pub time_spent_ms: f64,
}

impl ResultRecord {
    pub fn planner_short_name(&self) -> &str {
        planner_short_name(&self.planner)
    }

    pub fn benchmark_group(&self) -> Option<String> {
        DomainLayout::new(&self.domain).benchmark_group
    }

    /// Value of `variable`, `None` when the variable does not apply to records.
    /// Time is reported in seconds.
    pub fn evaluated_value(&self, variable: &Variable) -> Option<f64> {
        match variable {
            Variable::PlanLength => Some(self.plan_length as f64),
            Variable::TimeSpent => Some(self.time_spent_ms / 1000.0),
            Variable::Other(_) => None,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{DOMAIN}={};{PB_INDEX}={};{PLANNER}={};{PLAN_LENGTH}={};{TIME_SPENT}={:?};",
            self.domain, self.problem_index, self.planner, self.plan_length, self.time_spent_ms
        )
    }

    pub fn decode(text: &str) -> Result<Self, RecordError> {
        let fields = Fields::parse(text);
        Ok(Self {
            domain: required(&fields, DOMAIN)?.to_owned(),
            problem_index: parsed(&fields, PB_INDEX)?,
            planner: required(&fields, PLANNER)?.to_owned(),
            plan_length: parsed(&fields, PLAN_LENGTH)?,
            time_spent_ms: parsed(&fields, TIME_SPENT)?,
        })
    }
}

fn required<'a>(fields: &Fields<'a>, key: &'static str) -> Result<&'a str, RecordError> {
    fields.get(key).ok_or(RecordError::MissingField(key))
}

fn parsed<T: FromStr>(fields: &Fields<'_>, key: &'static str) -> Result<T, RecordError> {
    let value = required(fields, key)?;
    value.trim().parse().map_err(|_| RecordError::InvalidValue {
        key,
        value: value.to_owned(),
    })
}

impl FromStr for ResultRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Domain : {}", self.domain)?;
        writeln!(f, "Planner : {}", self.planner)?;
        writeln!(f, "Problem index : {}", self.problem_index)?;
        writeln!(f, "Plan length : {}", self.plan_length)?;
        write!(f, "Time spent : {} seconds", self.time_spent_ms / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ResultRecord {
        ResultRecord {
            domain: "pddl/ipc2002/depots/strips-automatic/domain.pddl".to_owned(),
            problem_index: 3,
            planner: "fr.uga.pddl4j.exercise.mcts.MCTS".to_owned(),
            plan_length: 17,
            time_spent_ms: 123.5,
        }
    }

    #[test]
    fn encodes_fields_in_fixed_order() {
        assert_eq!(
            record().encode(),
            "domain=pddl/ipc2002/depots/strips-automatic/domain.pddl;pbIndex=3;\
             planner=fr.uga.pddl4j.exercise.mcts.MCTS;planLength=17;timeSpent=123.5;"
        );
    }

    #[test]
    fn decode_reverses_encode() {
        let mut r = record();
        assert_eq!(ResultRecord::decode(&r.encode()), Ok(r.clone()));

        r.time_spent_ms = 2000.0;
        r.plan_length = 0;
        assert_eq!(r.encode().parse::<ResultRecord>(), Ok(r.clone()));

        r.domain = "pddl/depots/strips/domain.pddl ".to_owned();
        r.planner = " HSP\t".to_owned();
        assert_eq!(ResultRecord::decode(&r.encode()), Ok(r.clone()));
        assert_eq!(ResultRecord::decode(&format!("{}\n", r.encode())), Ok(r));
    }

    #[test]
    fn decode_is_order_independent() {
        let text = "timeSpent=2000.0;planLength=4;planner=HSP;pbIndex=1;domain=a/b/c/domain.pddl;\n";
        let r = ResultRecord::decode(text).unwrap();
        assert_eq!(r.planner, "HSP");
        assert_eq!(r.problem_index, 1);
        assert_eq!(r.plan_length, 4);
        assert_eq!(r.time_spent_ms, 2000.0);
    }

    #[test]
    fn decode_reports_missing_field() {
        let text = "domain=a/b/c/domain.pddl;pbIndex=1;planner=HSP;timeSpent=3.0;";
        assert_eq!(
            ResultRecord::decode(text),
            Err(RecordError::MissingField("planLength"))
        );
    }

    #[test]
    fn decode_reports_invalid_number() {
        let text = "domain=d;pbIndex=one;planner=HSP;planLength=1;timeSpent=3.0;";
        assert!(matches!(
            ResultRecord::decode(text),
            Err(RecordError::InvalidValue { key: "pbIndex", .. })
        ));
    }

    #[test]
    fn evaluated_value_by_variable() {
        let mut r = record();
        r.time_spent_ms = 2000.0;
        assert_eq!(r.evaluated_value(&"timeSpent".into()), Some(2.0));
        assert_eq!(r.evaluated_value(&"planLength".into()), Some(17.0));
        assert_eq!(r.evaluated_value(&"unknown".into()), None);

        r.plan_length = 0;
        assert_eq!(r.evaluated_value(&Variable::PlanLength), Some(0.0));
    }

    #[test]
    fn derived_names() {
        let r = record();
        assert_eq!(r.planner_short_name(), "MCTS");
        assert_eq!(r.benchmark_group().as_deref(), Some("depots"));
        assert_eq!(Variable::TimeSpent.label(), "timeSpent (seconds)");
        assert_eq!(Variable::PlanLength.label(), "planLength");
    }
}
