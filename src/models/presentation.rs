use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

impl ChoiceOption {
    pub fn same(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarProps {
    pub min_date: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_days_of_week: Vec<u8>,
}

/// What the UI should render for the next answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "component")]
pub enum StepOptions {
    Input {
        placeholder: String,
    },
    Select {
        options: Vec<ChoiceOption>,
    },
    ButtonGroup {
        options: Vec<ChoiceOption>,
    },
    Calendar {
        #[serde(rename = "calendarProps")]
        calendar_props: CalendarProps,
    },
}

impl StepOptions {
    pub fn input(placeholder: impl Into<String>) -> Self {
        StepOptions::Input {
            placeholder: placeholder.into(),
        }
    }

    pub fn choices(&self) -> &[ChoiceOption] {
        match self {
            StepOptions::Select { options } | StepOptions::ButtonGroup { options } => options,
            _ => &[],
        }
    }
}
