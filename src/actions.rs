use chrono::{NaiveDate, NaiveTime};

use crate::error::BookingError;
use crate::models::TIME_FORMAT;

/// Максимальное смещение календаря в месяцах в обе стороны.
pub const MAX_MONTH_OFFSET: i32 = 1200;

/// Максимальная длина callback data в Telegram, в байтах.
pub const MAX_CALLBACK_DATA: usize = 64;

/// Токен выбора дня.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayToken {
    /// `day_<yyyy-mm-dd>`
    Date(NaiveDate),
    /// `day_<month>_<day>`, год берётся текущий
    MonthDay { month: u32, day: u32 },
}

/// Действие пользователя, закодированное в callback data кнопки.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Employee(String),
    Service(String),
    Day(DayToken),
    Time(NaiveTime),
    Cancel(usize),
    PrevMonth(i32),
    NextMonth(i32),
    Ignore,
    MainMenu,
    ChooseEmployee,
    ChooseService,
    ChooseDate,
}

impl Action {
    pub fn parse(data: &str) -> Result<Action, BookingError> {
        let malformed = || BookingError::Malformed(data.to_string());

        let action = match data {
            "ignore" => Action::Ignore,
            "main_menu" => Action::MainMenu,
            "choose_employee" => Action::ChooseEmployee,
            "choose_service" => Action::ChooseService,
            "choose_date" => Action::ChooseDate,
            "prev_month" => Action::PrevMonth(0),
            "next_month" => Action::NextMonth(1),
            _ => {
                let (kind, payload) = data.split_once('_').ok_or_else(malformed)?;
                match kind {
                    "employee" if !payload.is_empty() => Action::Employee(payload.to_string()),
                    "service" if !payload.is_empty() => Action::Service(payload.to_string()),
                    "day" => Action::Day(parse_day(payload).ok_or_else(malformed)?),
                    "time" => Action::Time(NaiveTime::parse_from_str(payload, TIME_FORMAT)?),
                    "cancel" => Action::Cancel(payload.parse().map_err(|_| malformed())?),
                    "prev" | "next" => {
                        let offset: i32 = payload
                            .strip_prefix("month_")
                            .and_then(|n| n.parse().ok())
                            .filter(|n| (-MAX_MONTH_OFFSET..=MAX_MONTH_OFFSET).contains(n))
                            .ok_or_else(malformed)?;
                        if kind == "prev" {
                            Action::PrevMonth(offset)
                        } else {
                            Action::NextMonth(offset)
                        }
                    }
                    _ => return Err(malformed()),
                }
            }
        };
        Ok(action)
    }

    pub fn token(&self) -> String {
        match self {
            Action::Employee(name) => format!("employee_{}", name),
            Action::Service(name) => format!("service_{}", name),
            Action::Day(DayToken::Date(date)) => format!("day_{}", date),
            Action::Day(DayToken::MonthDay { month, day }) => format!("day_{}_{}", month, day),
            Action::Time(time) => format!("time_{}", time.format(TIME_FORMAT)),
            Action::Cancel(position) => format!("cancel_{}", position),
            Action::PrevMonth(offset) => format!("prev_month_{}", offset),
            Action::NextMonth(offset) => format!("next_month_{}", offset),
            Action::Ignore => "ignore".to_string(),
            Action::MainMenu => "main_menu".to_string(),
            Action::ChooseEmployee => "choose_employee".to_string(),
            Action::ChooseService => "choose_service".to_string(),
            Action::ChooseDate => "choose_date".to_string(),
        }
    }
}

fn parse_day(payload: &str) -> Option<DayToken> {
    if let Ok(date) = NaiveDate::parse_from_str(payload, "%Y-%m-%d") {
        return Some(DayToken::Date(date));
    }
    let (month, day) = payload.split_once('_')?;
    Some(DayToken::MonthDay {
        month: month.parse().ok()?,
        day: day.parse().ok()?,
    })
}

/// Кнопка клавиатуры. `Action::Ignore` делает её неактивной.
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Button { label: label.into(), action }
    }

    pub fn inert(label: impl Into<String>) -> Self {
        Button::new(label, Action::Ignore)
    }

    pub fn is_interactive(&self) -> bool {
        self.action != Action::Ignore
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selection_tokens() {
        assert_eq!(Action::parse("employee_Анна").unwrap(), Action::Employee("Анна".into()));
        assert_eq!(
            Action::parse("service_Мужская стрижка").unwrap(),
            Action::Service("Мужская стрижка".into())
        );
        assert_eq!(
            Action::parse("time_11:30").unwrap(),
            Action::Time(NaiveTime::from_hms_opt(11, 30, 0).unwrap())
        );
        assert_eq!(Action::parse("cancel_3").unwrap(), Action::Cancel(3));
    }

    #[test]
    fn parses_both_day_forms() {
        assert_eq!(
            Action::parse("day_2025-06-15").unwrap(),
            Action::Day(DayToken::Date(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()))
        );
        assert_eq!(
            Action::parse("day_6_15").unwrap(),
            Action::Day(DayToken::MonthDay { month: 6, day: 15 })
        );
    }

    #[test]
    fn parses_navigation() {
        assert_eq!(Action::parse("next_month").unwrap(), Action::NextMonth(1));
        assert_eq!(Action::parse("prev_month").unwrap(), Action::PrevMonth(0));
        assert_eq!(Action::parse("next_month_3").unwrap(), Action::NextMonth(3));
        assert_eq!(Action::parse("prev_month_-1").unwrap(), Action::PrevMonth(-1));
        assert_eq!(Action::parse("choose_service").unwrap(), Action::ChooseService);
    }

    #[test]
    fn month_offset_is_bounded() {
        assert_eq!(Action::parse("next_month_1200").unwrap(), Action::NextMonth(1200));
        assert_eq!(Action::parse("prev_month_-1200").unwrap(), Action::PrevMonth(-1200));
        for data in ["next_month_1201", "prev_month_-1201", "next_month_2147483647", "prev_month_-2147483648"] {
            assert!(matches!(Action::parse(data), Err(BookingError::Malformed(_))), "{data}");
        }
    }

    #[test]
    fn rejects_malformed_tokens() {
        for data in ["", "time_25:99", "cancel_x", "day_foo", "employee_", "bogus", "next_page_1"] {
            assert!(
                matches!(Action::parse(data), Err(BookingError::Malformed(_))),
                "{data} should be malformed"
            );
        }
    }

    #[test]
    fn token_is_parsed_back() {
        let actions = [
            Action::Day(DayToken::Date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())),
            Action::Time(NaiveTime::from_hms_opt(19, 30, 0).unwrap()),
            Action::NextMonth(2),
            Action::MainMenu,
        ];
        for action in actions {
            assert_eq!(Action::parse(&action.token()).unwrap(), action);
        }
    }
}
