//! Current date/time tool, rendered in the gym's timezone

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rig::completion::ToolDefinition;
use rig::tool::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use std::convert::Infallible;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DateTimeFormat {
    Date,
    Time,
    #[default]
    Both,
    Day,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DateTimeArgs {
    #[schemars(description = "'date', 'time', 'both', or 'day' (day of week)")]
    #[serde(default)]
    pub format: DateTimeFormat,
}

#[derive(Clone, Debug)]
pub struct CurrentDateTime {
    timezone: Tz,
}

impl CurrentDateTime {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Render `now` in the configured timezone
    pub fn render(&self, now: DateTime<Utc>, format: DateTimeFormat) -> String {
        let local = now.with_timezone(&self.timezone);
        match format {
            DateTimeFormat::Date => local.format("%m/%d/%Y").to_string(),
            DateTimeFormat::Time => local.format("%-I:%M:%S %p").to_string(),
            DateTimeFormat::Day => local.format("%A").to_string(),
            DateTimeFormat::Both => local.format("%m/%d/%Y, %-I:%M:%S %p").to_string(),
        }
    }
}

impl Tool for CurrentDateTime {
    const NAME: &'static str = "current_datetime";
    type Error = Infallible;
    type Args = DateTimeArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Get the current date, time, or both. Useful for questions about current time, date, day of week, or resolving words like 'today' and 'tomorrow'.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "enum": ["date", "time", "both", "day"],
                        "description": "'date' for current date, 'time' for current time, 'both' for date and time, 'day' for day of week"
                    }
                },
                "required": ["format"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        Ok(self.render(Utc::now(), args.format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 18, 15, 4, 5).unwrap()
    }

    #[test]
    fn renders_each_format() {
        let tool = CurrentDateTime::new(chrono_tz::UTC);
        assert_eq!(tool.render(fixed(), DateTimeFormat::Date), "01/18/2025");
        assert_eq!(tool.render(fixed(), DateTimeFormat::Time), "3:04:05 PM");
        assert_eq!(tool.render(fixed(), DateTimeFormat::Day), "Saturday");
        assert_eq!(
            tool.render(fixed(), DateTimeFormat::Both),
            "01/18/2025, 3:04:05 PM"
        );
    }

    #[test]
    fn shifts_into_gym_timezone() {
        let tool = CurrentDateTime::new(chrono_tz::America::Chicago);
        assert_eq!(tool.render(fixed(), DateTimeFormat::Time), "9:04:05 AM");
    }

    #[test]
    fn format_defaults_to_both() {
        let args: DateTimeArgs = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(args.format, DateTimeFormat::Both);
    }

    #[tokio::test]
    async fn definition_names_the_tool() {
        let tool = CurrentDateTime::new(chrono_tz::UTC);
        let def = tool.definition(String::new()).await;
        assert_eq!(def.name, "current_datetime");
    }
}
