use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;
use log::{debug, info};

use crate::error::BookingError;
use crate::models::{Appointment, AppointmentField, BookingStep};

/// Хранилище записей. Реестр работает только через этот трейт,
/// так что хранилище можно заменить без изменения вызывающего кода.
pub trait AppointmentStore {
    fn get(&self, chat_id: i64) -> Option<&Vec<Appointment>>;
    fn get_mut(&mut self, chat_id: i64) -> Option<&mut Vec<Appointment>>;
    fn get_or_create(&mut self, chat_id: i64) -> &mut Vec<Appointment>;
    fn remove(&mut self, chat_id: i64);
    fn all(&self) -> Box<dyn Iterator<Item = &Appointment> + '_>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    appointments: HashMap<i64, Vec<Appointment>>,
}

impl AppointmentStore for InMemoryStore {
    fn get(&self, chat_id: i64) -> Option<&Vec<Appointment>> {
        self.appointments.get(&chat_id)
    }

    fn get_mut(&mut self, chat_id: i64) -> Option<&mut Vec<Appointment>> {
        self.appointments.get_mut(&chat_id)
    }

    fn get_or_create(&mut self, chat_id: i64) -> &mut Vec<Appointment> {
        self.appointments.entry(chat_id).or_default()
    }

    fn remove(&mut self, chat_id: i64) {
        self.appointments.remove(&chat_id);
    }

    fn all(&self) -> Box<dyn Iterator<Item = &Appointment> + '_> {
        Box::new(self.appointments.values().flatten())
    }
}

// Реестр записей: chat id -> записи в порядке создания.
// В процессе может быть только последняя запись чата, её поля заполняются
// по порядку шагов и очищаются через `rewind`.
#[derive(Debug, Default)]
pub struct Registry<S: AppointmentStore = InMemoryStore> {
    store: S,
}

impl Registry<InMemoryStore> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: AppointmentStore> Registry<S> {
    pub fn with_store(store: S) -> Self {
        Registry { store }
    }

    /// Начинает новую запись с выбранным сотрудником.
    /// Незавершённый черновик в конце списка отбрасывается.
    pub fn begin(&mut self, chat_id: i64, employee: &str) {
        self.abandon(chat_id);
        let list = self.store.get_or_create(chat_id);
        list.push(Appointment::new(employee));
        info!("Chat {} started booking with {}", chat_id, employee);
    }

    /// Заполняет поле черновика. Поле должно относиться к текущему шагу.
    pub fn set_field(&mut self, chat_id: i64, field: AppointmentField) -> Result<(), BookingError> {
        let draft = self
            .store
            .get_mut(chat_id)
            .and_then(|list| list.last_mut())
            .filter(|a| !a.is_confirmed())
            .ok_or(BookingError::NoActiveBooking(chat_id))?;

        let step = draft.step();
        if field.step() != step {
            return Err(BookingError::OutOfOrder { field: field.name(), step });
        }

        debug!("Chat {} sets {} at {:?}", chat_id, field.name(), step);
        match field {
            AppointmentField::Service(name) => draft.service = Some(name),
            AppointmentField::Date(date) => draft.date = Some(date),
            AppointmentField::DateTime(datetime) => {
                // дата черновика и дата слота должны совпадать
                if draft.date != Some(datetime.date()) {
                    return Err(BookingError::OutOfOrder { field: "datetime", step });
                }
                draft.datetime = Some(datetime);
            }
        }
        Ok(())
    }

    pub fn list(&self, chat_id: i64) -> &[Appointment] {
        self.store.get(chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn draft(&self, chat_id: i64) -> Option<&Appointment> {
        self.list(chat_id).last().filter(|a| !a.is_confirmed())
    }

    /// Удаляет запись по позиции в списке (с единицы).
    pub fn cancel(&mut self, chat_id: i64, position: usize) -> Result<Appointment, BookingError> {
        let list = self
            .store
            .get_mut(chat_id)
            .ok_or(BookingError::InvalidPosition { position, len: 0 })?;
        if position == 0 || position > list.len() {
            return Err(BookingError::InvalidPosition { position, len: list.len() });
        }

        let removed = list.remove(position - 1);
        if list.is_empty() {
            self.store.remove(chat_id);
        }
        info!("Chat {} cancelled appointment #{}", chat_id, position);
        Ok(removed)
    }

    /// Возврат к шагу `step`: очищает поля этого шага и всех следующих.
    pub fn rewind(&mut self, chat_id: i64, step: BookingStep) -> Result<(), BookingError> {
        if step == BookingStep::SelectingEmployee {
            self.abandon(chat_id);
            return Ok(());
        }

        let draft = self
            .store
            .get_mut(chat_id)
            .and_then(|list| list.last_mut())
            .filter(|a| !a.is_confirmed())
            .ok_or(BookingError::NoActiveBooking(chat_id))?;

        if step <= BookingStep::SelectingService {
            draft.service = None;
        }
        if step <= BookingStep::SelectingDate {
            draft.date = None;
        }
        draft.datetime = None;
        debug!("Chat {} rewound to {:?}", chat_id, step);
        Ok(())
    }

    /// Отбрасывает незавершённый черновик, если он есть.
    pub fn abandon(&mut self, chat_id: i64) {
        let Some(list) = self.store.get_mut(chat_id) else {
            return;
        };
        if list.last().is_some_and(|a| !a.is_confirmed()) {
            list.pop();
            debug!("Chat {} dropped unfinished booking", chat_id);
        }
        if list.is_empty() {
            self.store.remove(chat_id);
        }
    }

    /// Занятые слоты сотрудника по всем чатам.
    pub fn booked_slots(&self, employee: &str) -> BTreeSet<NaiveDateTime> {
        self.store
            .all()
            .filter(|a| a.employee == employee)
            .filter_map(|a| a.datetime)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
        d.and_time(NaiveTime::from_hms_opt(h, min, 0).unwrap())
    }

    // хранилище с упорядоченными чатами, чтобы проверить подмену InMemoryStore
    #[derive(Default)]
    struct OrderedStore {
        chats: BTreeMap<i64, Vec<Appointment>>,
        removed: Vec<i64>,
    }

    impl AppointmentStore for OrderedStore {
        fn get(&self, chat_id: i64) -> Option<&Vec<Appointment>> {
            self.chats.get(&chat_id)
        }

        fn get_mut(&mut self, chat_id: i64) -> Option<&mut Vec<Appointment>> {
            self.chats.get_mut(&chat_id)
        }

        fn get_or_create(&mut self, chat_id: i64) -> &mut Vec<Appointment> {
            self.chats.entry(chat_id).or_default()
        }

        fn remove(&mut self, chat_id: i64) {
            self.chats.remove(&chat_id);
            self.removed.push(chat_id);
        }

        fn all(&self) -> Box<dyn Iterator<Item = &Appointment> + '_> {
            Box::new(self.chats.values().flatten())
        }
    }

    fn confirmed(registry: &mut Registry, chat_id: i64, employee: &str, slot: NaiveDateTime) {
        registry.begin(chat_id, employee);
        registry.set_field(chat_id, AppointmentField::Service("Стрижка".into())).unwrap();
        registry.set_field(chat_id, AppointmentField::Date(slot.date())).unwrap();
        registry.set_field(chat_id, AppointmentField::DateTime(slot)).unwrap();
    }

    #[test]
    fn full_booking_flow_is_listed() {
        let mut registry = Registry::new();
        let day = date(2025, 6, 15);

        registry.begin(42, "Anna");
        registry.set_field(42, AppointmentField::Service("Haircut".into())).unwrap();
        registry.set_field(42, AppointmentField::Date(day)).unwrap();
        registry.set_field(42, AppointmentField::DateTime(at(day, 11, 0))).unwrap();

        let list = registry.list(42);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].employee, "Anna");
        assert_eq!(list[0].service.as_deref(), Some("Haircut"));
        assert_eq!(list[0].date_label().as_deref(), Some("15.06.2025"));
        assert_eq!(list[0].datetime_label().as_deref(), Some("15.06.2025 11:00"));
        assert!(registry.draft(42).is_none());
    }

    #[test]
    fn set_field_without_booking_is_an_error() {
        let mut registry = Registry::new();
        let err = registry.set_field(7, AppointmentField::Service("Стрижка".into()));
        assert_eq!(err, Err(BookingError::NoActiveBooking(7)));
        assert!(registry.list(7).is_empty());
    }

    #[test]
    fn set_field_after_confirmation_is_an_error() {
        let mut registry = Registry::new();
        confirmed(&mut registry, 1, "Анна", at(date(2025, 6, 15), 10, 0));
        let err = registry.set_field(1, AppointmentField::Service("Окрашивание".into()));
        assert_eq!(err, Err(BookingError::NoActiveBooking(1)));
    }

    #[test]
    fn fields_must_follow_booking_order() {
        let mut registry = Registry::new();
        registry.begin(1, "Анна");
        let err = registry.set_field(1, AppointmentField::Date(date(2025, 6, 15)));
        assert_eq!(
            err,
            Err(BookingError::OutOfOrder { field: "date", step: BookingStep::SelectingService })
        );
    }

    #[test]
    fn datetime_must_match_selected_date() {
        let mut registry = Registry::new();
        registry.begin(1, "Анна");
        registry.set_field(1, AppointmentField::Service("Стрижка".into())).unwrap();
        registry.set_field(1, AppointmentField::Date(date(2025, 6, 15))).unwrap();
        let err = registry.set_field(1, AppointmentField::DateTime(at(date(2025, 6, 16), 10, 0)));
        assert!(matches!(err, Err(BookingError::OutOfOrder { field: "datetime", .. })));
    }

    #[test]
    fn cancel_last_entry_removes_conversation() {
        let mut registry = Registry::new();
        confirmed(&mut registry, 5, "Анна", at(date(2025, 6, 15), 12, 30));

        let removed = registry.cancel(5, 1).unwrap();
        assert_eq!(removed.employee, "Анна");
        assert!(registry.list(5).is_empty());
        assert!(registry.store.get(5).is_none());
    }

    #[test]
    fn cancel_out_of_range_keeps_state() {
        let mut registry = Registry::new();
        confirmed(&mut registry, 5, "Анна", at(date(2025, 6, 15), 12, 30));

        assert_eq!(registry.cancel(5, 0), Err(BookingError::InvalidPosition { position: 0, len: 1 }));
        assert_eq!(registry.cancel(5, 2), Err(BookingError::InvalidPosition { position: 2, len: 1 }));
        assert_eq!(registry.cancel(9, 1), Err(BookingError::InvalidPosition { position: 1, len: 0 }));
        assert_eq!(registry.list(5).len(), 1);
    }

    #[test]
    fn cancel_keeps_order_of_remaining() {
        let mut registry = Registry::new();
        let day = date(2025, 6, 15);
        confirmed(&mut registry, 5, "Анна", at(day, 10, 0));
        confirmed(&mut registry, 5, "Мария", at(day, 11, 0));
        confirmed(&mut registry, 5, "Анна", at(day, 12, 0));

        registry.cancel(5, 2).unwrap();
        let times: Vec<_> = registry.list(5).iter().filter_map(|a| a.datetime_label()).collect();
        assert_eq!(times, vec!["15.06.2025 10:00", "15.06.2025 12:00"]);
    }

    #[test]
    fn begin_replaces_unfinished_draft() {
        let mut registry = Registry::new();
        registry.begin(3, "Анна");
        registry.set_field(3, AppointmentField::Service("Стрижка".into())).unwrap();
        registry.begin(3, "Мария");

        let list = registry.list(3);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].employee, "Мария");
        assert_eq!(list[0].service, None);
    }

    #[test]
    fn rewind_clears_target_and_later_fields() {
        let mut registry = Registry::new();
        registry.begin(3, "Анна");
        registry.set_field(3, AppointmentField::Service("Стрижка".into())).unwrap();
        registry.set_field(3, AppointmentField::Date(date(2025, 6, 15))).unwrap();

        registry.rewind(3, BookingStep::SelectingDate).unwrap();
        let draft = registry.draft(3).unwrap();
        assert_eq!(draft.service.as_deref(), Some("Стрижка"));
        assert_eq!(draft.date, None);

        registry.rewind(3, BookingStep::SelectingService).unwrap();
        assert_eq!(registry.draft(3).unwrap().service, None);

        registry.rewind(3, BookingStep::SelectingEmployee).unwrap();
        assert!(registry.list(3).is_empty());
    }

    #[test]
    fn abandon_keeps_confirmed_bookings() {
        let mut registry = Registry::new();
        confirmed(&mut registry, 3, "Анна", at(date(2025, 6, 15), 10, 0));
        registry.abandon(3);
        assert_eq!(registry.list(3).len(), 1);

        registry.begin(3, "Мария");
        registry.abandon(3);
        assert_eq!(registry.list(3).len(), 1);
        assert!(registry.draft(3).is_none());
    }

    #[test]
    fn booked_slots_are_per_employee() {
        let mut registry = Registry::new();
        let day = date(2025, 6, 15);
        confirmed(&mut registry, 1, "Анна", at(day, 11, 0));
        confirmed(&mut registry, 2, "Мария", at(day, 12, 0));
        registry.begin(3, "Анна");

        let anna = registry.booked_slots("Анна");
        assert_eq!(anna.into_iter().collect::<Vec<_>>(), vec![at(day, 11, 0)]);
        assert!(registry.booked_slots("Ольга").is_empty());
    }

    #[test]
    fn registry_works_over_injected_store() {
        let mut registry = Registry::with_store(OrderedStore::default());
        let day = date(2025, 6, 15);

        registry.begin(42, "Анна");
        registry.set_field(42, AppointmentField::Service("Стрижка".into())).unwrap();
        registry.set_field(42, AppointmentField::Date(day)).unwrap();
        registry.set_field(42, AppointmentField::DateTime(at(day, 11, 0))).unwrap();

        assert_eq!(registry.list(42).len(), 1);
        assert!(registry.booked_slots("Анна").contains(&at(day, 11, 0)));

        registry.cancel(42, 1).unwrap();
        assert!(registry.list(42).is_empty());
        assert_eq!(registry.store.removed, vec![42]);
    }
}
