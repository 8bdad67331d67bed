//! Free booking slots for a doctor on one date.

use chrono::{Duration, NaiveTime};

use crate::models::{fmt_hora, parse_hora, Horario};

/// Splits each window into `slot_minutes` steps starting at `hora_inicio`;
/// a slot is offered only if it fits entirely before `hora_fin`. Slots in
/// `booked`, or earlier than `not_before`, are dropped. Output is sorted
/// and free of duplicates.
pub fn free_slots(
    horarios: &[Horario],
    booked: &[String],
    slot_minutes: u32,
    not_before: Option<NaiveTime>,
) -> Vec<String> {
    if slot_minutes == 0 {
        return Vec::new();
    }
    let step = Duration::minutes(i64::from(slot_minutes));
    let mut slots: Vec<NaiveTime> = Vec::new();

    for h in horarios {
        let (Some(inicio), Some(fin)) = (parse_hora(&h.hora_inicio), parse_hora(&h.hora_fin)) else {
            tracing::warn!(horario_id = h.id, "skipping horario with malformed hours");
            continue;
        };

        let mut t = inicio;
        loop {
            let (end, wrapped) = t.overflowing_add_signed(step);
            if wrapped != 0 || end > fin {
                break;
            }
            slots.push(t);
            t = end;
        }
    }

    slots.sort();
    slots.dedup();
    slots
        .into_iter()
        .filter(|t| not_before.is_none_or(|nb| *t >= nb))
        .map(fmt_hora)
        .filter(|s| !booked.contains(s))
        .collect()
}
