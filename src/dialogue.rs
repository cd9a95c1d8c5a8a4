use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info, warn};

use crate::actions::{Action, Button};
use crate::calendar::{self, Selection};
use crate::config::Config;
use crate::error::BookingError;
use crate::models::{Appointment, AppointmentField, BookingStep, TIME_FORMAT};
use crate::registry::{AppointmentStore, Registry};

pub const BOOK_BUTTON: &str = "Записаться на услугу";
pub const VIEW_BUTTON: &str = "Просмотреть записи";
pub const CANCEL_BUTTON: &str = "Отменить запись";

const GENERIC_ERROR: &str = "Что-то пошло не так. Попробуйте начать запись заново.";

#[derive(Debug, Clone, PartialEq)]
pub enum Keyboard {
    None,
    MainMenu,
    Inline(Vec<Vec<Button>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
    /// Заменить сообщение, с которого пришло нажатие, вместо отправки нового
    pub replace: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Reply { text: text.into(), keyboard: Keyboard::None, replace: false }
    }

    fn inline(text: impl Into<String>, rows: Vec<Vec<Button>>) -> Self {
        Reply { text: text.into(), keyboard: Keyboard::Inline(rows), replace: false }
    }
}

/// Обработчик одного события для одного чата. Не зависит от Telegram:
/// команды и нажатия превращаются в изменения реестра и ответы.
pub struct Router<'a, S: AppointmentStore> {
    config: &'a Config,
    registry: &'a mut Registry<S>,
    chat_id: i64,
    now: NaiveDateTime,
}

impl<'a, S: AppointmentStore> Router<'a, S> {
    pub fn new(config: &'a Config, registry: &'a mut Registry<S>, chat_id: i64, now: NaiveDateTime) -> Self {
        Router { config, registry, chat_id, now }
    }

    pub fn start(&mut self) -> Vec<Reply> {
        vec![self.main_menu()]
    }

    pub fn help(&mut self) -> Vec<Reply> {
        let text = format!(
            "Я помогу записаться в {}.\n\n\
             «{}» - выбрать сотрудника, услугу, дату и время\n\
             «{}» - список ваших записей\n\
             «{}» - отменить одну из записей",
            self.config.studio_name, BOOK_BUTTON, VIEW_BUTTON, CANCEL_BUTTON
        );
        vec![Reply { text, keyboard: Keyboard::MainMenu, replace: false }]
    }

    pub fn on_text(&mut self, text: &str) -> Vec<Reply> {
        match text {
            BOOK_BUTTON => {
                self.registry.abandon(self.chat_id);
                vec![self.choose_employee()]
            }
            VIEW_BUTTON => vec![self.view_appointments()],
            CANCEL_BUTTON => vec![self.cancel_menu()],
            _ => {
                debug!("Chat {} sent unknown text", self.chat_id);
                vec![self.main_menu()]
            }
        }
    }

    pub fn on_action(&mut self, data: &str) -> Vec<Reply> {
        let result = Action::parse(data).and_then(|action| self.route(action));
        match result {
            Ok(replies) => replies,
            Err(err) => self.recover(err),
        }
    }

    fn route(&mut self, action: Action) -> Result<Vec<Reply>, BookingError> {
        debug!("Chat {} action {:?}", self.chat_id, action);
        match action {
            Action::Employee(name) => {
                self.config.employee(&name)?;
                self.registry.begin(self.chat_id, &name);
                Ok(vec![self.choose_service()?])
            }
            Action::Service(name) => {
                let employee = self.draft()?.employee.clone();
                self.config.service(&employee, &name)?;
                self.registry.rewind(self.chat_id, BookingStep::SelectingService)?;
                self.registry.set_field(self.chat_id, AppointmentField::Service(name))?;
                Ok(vec![self.choose_date(0, false)])
            }
            Action::Day(day) => match calendar::resolve_day(day, self.now)? {
                Selection::PastDate => {
                    info!("Chat {} picked a past date", self.chat_id);
                    Ok(vec![
                        Reply::text("Запись на прошедшую дату невозможна."),
                        self.choose_date(0, false),
                    ])
                }
                Selection::Date(date) => {
                    self.draft()?;
                    self.registry.rewind(self.chat_id, BookingStep::SelectingDate)?;
                    self.registry.set_field(self.chat_id, AppointmentField::Date(date))?;
                    Ok(vec![self.choose_time()?])
                }
                Selection::NoSelection => Ok(vec![self.choose_date(0, true)]),
            },
            Action::Time(time) if self.registry.draft(self.chat_id).is_none() => {
                // повторное нажатие после подтверждения
                debug!("Chat {} pressed {} without active booking", self.chat_id, time);
                Ok(vec![self.main_menu()])
            }
            Action::Time(time) => self.confirm(time),
            Action::Cancel(position) => Ok(self.cancel(position)),
            Action::PrevMonth(offset) | Action::NextMonth(offset) => Ok(vec![self.choose_date(offset, true)]),
            Action::Ignore => Ok(Vec::new()),
            Action::MainMenu => {
                self.registry.abandon(self.chat_id);
                Ok(vec![self.main_menu()])
            }
            Action::ChooseEmployee => {
                self.registry.rewind(self.chat_id, BookingStep::SelectingEmployee)?;
                Ok(vec![self.choose_employee()])
            }
            Action::ChooseService => {
                self.registry.rewind(self.chat_id, BookingStep::SelectingService)?;
                Ok(vec![self.choose_service()?])
            }
            Action::ChooseDate => {
                self.registry.rewind(self.chat_id, BookingStep::SelectingDate)?;
                Ok(vec![self.choose_date(0, false)])
            }
        }
    }

    fn recover(&mut self, err: BookingError) -> Vec<Reply> {
        warn!("Chat {}: {}", self.chat_id, err);
        vec![Reply::text(GENERIC_ERROR), self.main_menu()]
    }

    fn draft(&self) -> Result<&Appointment, BookingError> {
        self.registry
            .draft(self.chat_id)
            .ok_or(BookingError::NoActiveBooking(self.chat_id))
    }

    fn main_menu(&self) -> Reply {
        Reply {
            text: format!("Добро пожаловать в {}!\nВыберите действие:", self.config.studio_name),
            keyboard: Keyboard::MainMenu,
            replace: false,
        }
    }

    fn choose_employee(&self) -> Reply {
        let mut rows: Vec<Vec<Button>> = self
            .config
            .employees
            .iter()
            .map(|e| vec![Button::new(e.name.clone(), Action::Employee(e.name.clone()))])
            .collect();
        rows.push(vec![Button::new("⟵ Назад", Action::MainMenu)]);
        Reply::inline("Выберите сотрудника:", rows)
    }

    fn choose_service(&self) -> Result<Reply, BookingError> {
        let employee = self.config.employee(&self.draft()?.employee)?;
        let mut rows: Vec<Vec<Button>> = employee
            .services
            .iter()
            .map(|s| {
                vec![Button::new(
                    format!("{} - {} ₽", s.name, s.price),
                    Action::Service(s.name.clone()),
                )]
            })
            .collect();
        rows.push(vec![Button::new("⟵ Назад", Action::ChooseEmployee)]);
        Ok(Reply::inline("Выберите услугу:", rows))
    }

    fn choose_date(&self, offset: i32, replace: bool) -> Reply {
        let grid = calendar::render_calendar(offset, self.now);
        Reply {
            text: "Выберите дату:".to_string(),
            keyboard: Keyboard::Inline(grid.rows()),
            replace,
        }
    }

    fn free_times(&self, appointment: &Appointment, date: NaiveDate) -> Vec<NaiveTime> {
        let booked = self.registry.booked_slots(&appointment.employee);
        calendar::available_slots(date, &booked, self.now)
    }

    fn choose_time(&self) -> Result<Reply, BookingError> {
        let draft = self.draft()?;
        let date = draft.date.ok_or(BookingError::OutOfOrder {
            field: "datetime",
            step: draft.step(),
        })?;
        let times = self.free_times(draft, date);

        let mut rows: Vec<Vec<Button>> = times
            .chunks(2)
            .map(|pair| {
                pair.iter()
                    .map(|t| Button::new(t.format(TIME_FORMAT).to_string(), Action::Time(*t)))
                    .collect()
            })
            .collect();
        rows.push(vec![Button::new("⟵ Назад", Action::ChooseDate)]);

        let text = if times.is_empty() {
            format!("На {} свободного времени нет.", calendar::format_date(date))
        } else {
            format!("Выберите время на {}:", calendar::format_date(date))
        };
        Ok(Reply::inline(text, rows))
    }

    fn confirm(&mut self, time: NaiveTime) -> Result<Vec<Reply>, BookingError> {
        let draft = self.draft()?;
        let date = draft.date.ok_or(BookingError::OutOfOrder {
            field: "datetime",
            step: draft.step(),
        })?;

        if !self.free_times(draft, date).contains(&time) {
            let slot = date.and_time(time);
            info!("Chat {}: slot {} is no longer free", self.chat_id, slot);
            return Ok(vec![
                Reply::text("Это время уже занято. Выберите другое."),
                self.choose_time()?,
            ]);
        }

        self.registry
            .set_field(self.chat_id, AppointmentField::DateTime(date.and_time(time)))?;
        let appointment = self
            .registry
            .list(self.chat_id)
            .last()
            .ok_or(BookingError::NoActiveBooking(self.chat_id))?;
        info!(
            "Chat {} booked {} at {}",
            self.chat_id,
            appointment.employee,
            appointment.datetime_label().unwrap_or_default()
        );

        let text = format!(
            "Вы записаны!\n{}",
            describe(appointment)
        );
        Ok(vec![Reply::text(text), self.main_menu()])
    }

    fn view_appointments(&self) -> Reply {
        let appointments = self.registry.list(self.chat_id);
        if appointments.is_empty() {
            return Reply { text: "У вас нет записей.".to_string(), keyboard: Keyboard::MainMenu, replace: false };
        }

        let mut text = String::from("Ваши записи:\n");
        for (i, appointment) in appointments.iter().enumerate() {
            text.push_str(&format!("Запись №{}\n{}\n", i + 1, describe(appointment)));
        }
        Reply { text, keyboard: Keyboard::MainMenu, replace: false }
    }

    fn cancel_menu(&self) -> Reply {
        let appointments = self.registry.list(self.chat_id);
        if appointments.is_empty() {
            return Reply {
                text: "У вас нет записей для отмены.".to_string(),
                keyboard: Keyboard::MainMenu,
                replace: false,
            };
        }

        let mut rows: Vec<Vec<Button>> = appointments
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let label = format!(
                    "{}. {} - {} - {}",
                    i + 1,
                    a.employee,
                    a.service.as_deref().unwrap_or("—"),
                    a.datetime_label().unwrap_or_else(|| "в процессе".to_string())
                );
                vec![Button::new(label, Action::Cancel(i + 1))]
            })
            .collect();
        rows.push(vec![Button::new("⟵ Назад", Action::MainMenu)]);
        Reply::inline("Выберите запись для отмены:", rows)
    }

    fn cancel(&mut self, position: usize) -> Vec<Reply> {
        let text = match self.registry.cancel(self.chat_id, position) {
            Ok(_) => "Запись отменена.",
            Err(err) => {
                warn!("Chat {}: {}", self.chat_id, err);
                "Неверный выбор. Попробуйте снова."
            }
        };
        vec![Reply::text(text), self.main_menu()]
    }
}

fn describe(appointment: &Appointment) -> String {
    format!(
        "Сотрудник: {}\nУслуга: {}\nДата и время: {}",
        appointment.employee,
        appointment.service.as_deref().unwrap_or("—"),
        appointment
            .datetime_label()
            .unwrap_or_else(|| "в процессе".to_string())
    )
}
