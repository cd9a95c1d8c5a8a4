use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

pub const DATE_FORMAT: &str = "%d.%m.%Y";
pub const TIME_FORMAT: &str = "%H:%M";
pub const DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Service {
    pub name: String,
    pub price: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Employee {
    pub name: String,
    pub services: Vec<Service>,
}

// Шаги записи. Порядок вариантов совпадает с порядком заполнения полей
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BookingStep {
    SelectingEmployee,
    SelectingService,
    SelectingDate,
    SelectingTime,
    Confirmed,
}

/// Значение одного поля записи для `Registry::set_field`.
/// Сотрудник задаётся только в `Registry::begin`.
#[derive(Debug, Clone, PartialEq)]
pub enum AppointmentField {
    Service(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl AppointmentField {
    pub fn name(&self) -> &'static str {
        match self {
            AppointmentField::Service(_) => "service",
            AppointmentField::Date(_) => "date",
            AppointmentField::DateTime(_) => "datetime",
        }
    }

    /// Шаг, на котором поле должно заполняться.
    pub fn step(&self) -> BookingStep {
        match self {
            AppointmentField::Service(_) => BookingStep::SelectingService,
            AppointmentField::Date(_) => BookingStep::SelectingDate,
            AppointmentField::DateTime(_) => BookingStep::SelectingTime,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    pub employee: String,
    pub service: Option<String>,
    pub date: Option<NaiveDate>,
    pub datetime: Option<NaiveDateTime>,
}

impl Appointment {
    pub fn new(employee: impl Into<String>) -> Self {
        Appointment {
            employee: employee.into(),
            service: None,
            date: None,
            datetime: None,
        }
    }

    pub fn step(&self) -> BookingStep {
        if self.datetime.is_some() {
            BookingStep::Confirmed
        } else if self.date.is_some() {
            BookingStep::SelectingTime
        } else if self.service.is_some() {
            BookingStep::SelectingDate
        } else {
            BookingStep::SelectingService
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.step() == BookingStep::Confirmed
    }

    pub fn date_label(&self) -> Option<String> {
        self.date.map(|d| d.format(DATE_FORMAT).to_string())
    }

    pub fn datetime_label(&self) -> Option<String> {
        self.datetime.map(|dt| dt.format(DATETIME_FORMAT).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn step_follows_filled_fields() {
        let mut appointment = Appointment::new("Анна");
        assert_eq!(appointment.step(), BookingStep::SelectingService);

        appointment.service = Some("Стрижка".into());
        assert_eq!(appointment.step(), BookingStep::SelectingDate);

        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        appointment.date = Some(date);
        assert_eq!(appointment.step(), BookingStep::SelectingTime);
        assert_eq!(appointment.date_label().as_deref(), Some("15.06.2025"));

        appointment.datetime = Some(date.and_time(NaiveTime::from_hms_opt(11, 0, 0).unwrap()));
        assert!(appointment.is_confirmed());
        assert_eq!(appointment.datetime_label().as_deref(), Some("15.06.2025 11:00"));
    }
}
