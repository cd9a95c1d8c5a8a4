use std::collections::BTreeSet;

use chrono::{Datelike, Local, Months, NaiveDate, NaiveDateTime, NaiveTime};

use crate::actions::{Action, Button, DayToken};
use crate::error::BookingError;
use crate::models::DATE_FORMAT;

/// Фиксированные получасовые слоты с 10:00 до 19:30.
pub const SLOT_COUNT: usize = 20;
const FIRST_SLOT_HOUR: u32 = 10;

const WEEKDAYS: [&str; 7] = ["Пн", "Вт", "Ср", "Чт", "Пт", "Сб", "Вс"];

pub fn current_datetime() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn all_slots() -> impl Iterator<Item = NaiveTime> {
    (0..SLOT_COUNT as u32).filter_map(|i| NaiveTime::from_hms_opt(FIRST_SLOT_HOUR + i / 2, (i % 2) * 30, 0))
}

/// Результат разбора нажатия на календарь.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    Date(NaiveDate),
    PastDate,
    NoSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarGrid {
    pub header: Vec<Button>,
    pub weekdays: Vec<Button>,
    pub weeks: Vec<Vec<Button>>,
    pub navigation: Vec<Button>,
    pub back: Vec<Button>,
}

impl CalendarGrid {
    pub fn rows(self) -> Vec<Vec<Button>> {
        let mut rows = Vec::with_capacity(self.weeks.len() + 4);
        rows.push(self.header);
        rows.push(self.weekdays);
        rows.extend(self.weeks);
        rows.push(self.navigation);
        rows.push(self.back);
        rows
    }
}

/// Первый день месяца, смещённого на `offset` календарных месяцев от `today`.
pub fn shifted_month(today: NaiveDate, offset: i32) -> NaiveDate {
    let first = today.with_day(1).unwrap_or(today);
    let months = Months::new(offset.unsigned_abs());
    let shifted = if offset >= 0 {
        first.checked_add_months(months)
    } else {
        first.checked_sub_months(months)
    };
    shifted.unwrap_or(first)
}

/// Недели месяца, начиная с понедельника. `None` для дней вне месяца.
pub fn month_weeks(year: i32, month: u32) -> Vec<[Option<u32>; 7]> {
    let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let num_days = days_in_month(month, year);
    let shift = first_day.weekday().num_days_from_monday() as usize;

    let mut weeks = Vec::new();
    let mut week = [None; 7];
    let mut col = shift;
    for day in 1..=num_days {
        week[col] = Some(day);
        col += 1;
        if col == 7 {
            weeks.push(week);
            week = [None; 7];
            col = 0;
        }
    }
    if col > 0 {
        weeks.push(week);
    }
    weeks
}

pub fn render_calendar(offset: i32, now: NaiveDateTime) -> CalendarGrid {
    let today = now.date();
    let month_start = shifted_month(today, offset);
    let (year, month) = (month_start.year(), month_start.month());

    let header = vec![Button::inert(format!("📅 {} {}", month_name(month), year))];
    let weekdays = WEEKDAYS.iter().map(|day| Button::inert(*day)).collect();

    let weeks = month_weeks(year, month)
        .into_iter()
        .map(|week| {
            week.iter()
                .map(|cell| match cell.and_then(|day| NaiveDate::from_ymd_opt(year, month, day)) {
                    Some(date) => {
                        let label = if date < today {
                            format!("❌ {}", date.day())
                        } else {
                            date.day().to_string()
                        };
                        Button::new(label, Action::Day(DayToken::Date(date)))
                    }
                    None => Button::inert(" "),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut navigation = Vec::new();
    if offset != 0 {
        navigation.push(Button::new("<<", Action::PrevMonth(offset.saturating_sub(1))));
    }
    navigation.push(Button::new(">>", Action::NextMonth(offset.saturating_add(1))));

    let back = vec![Button::new("⟵ Назад", Action::ChooseService)];

    CalendarGrid { header, weekdays, weeks, navigation, back }
}

/// Разбирает нажатие на день календаря.
pub fn interpret_selection(token: &str, now: NaiveDateTime) -> Result<Selection, BookingError> {
    match Action::parse(token) {
        Ok(Action::Day(day)) => resolve_day(day, now),
        Ok(_) => Ok(Selection::NoSelection),
        Err(err) if token.starts_with("day_") => Err(err),
        Err(_) => Ok(Selection::NoSelection),
    }
}

pub fn resolve_day(day: DayToken, now: NaiveDateTime) -> Result<Selection, BookingError> {
    let date = match day {
        DayToken::Date(date) => date,
        DayToken::MonthDay { month, day } => {
            let year = now.year();
            NaiveDate::from_ymd_opt(year, month, day).ok_or(BookingError::InvalidDate { year, month, day })?
        }
    };
    // прошедший день, а не просто прошедшее время сегодня
    if date < now.date() {
        Ok(Selection::PastDate)
    } else {
        Ok(Selection::Date(date))
    }
}

/// Свободные слоты на дату в формате `dd.mm.yyyy`.
pub fn available_times(
    selected_date: &str,
    booked: &BTreeSet<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<Vec<NaiveTime>, BookingError> {
    let date = NaiveDate::parse_from_str(selected_date, DATE_FORMAT)?;
    Ok(available_slots(date, booked, now))
}

pub fn available_slots(date: NaiveDate, booked: &BTreeSet<NaiveDateTime>, now: NaiveDateTime) -> Vec<NaiveTime> {
    let is_today = date == now.date();
    all_slots()
        .filter(|time| {
            let candidate = date.and_time(*time);
            !(is_today && candidate <= now) && !booked.contains(&candidate)
        })
        .collect()
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "Январь", 2 => "Февраль", 3 => "Март", 4 => "Апрель",
        5 => "Май", 6 => "Июнь", 7 => "Июль", 8 => "Август",
        9 => "Сентябрь", 10 => "Октябрь", 11 => "Ноябрь", 12 => "Декабрь",
        _ => "",
    }
}

fn days_in_month(month: u32, year: i32) -> u32 {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}
