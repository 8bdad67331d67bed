//! Booking workflow as driven by the patient web client.
//!
//! The flow is held entirely on the client: nothing is sent to the server
//! until [`BookingFlow::submit`] produces the request body, and a reload
//! simply drops the in-progress selection.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::models::{fmt_fecha, fmt_hora, CitaDetalle, CrearCitaRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum BookingState {
    SelectingSpecialist,
    SelectingDate {
        doctor_id: i64,
    },
    SelectingTime {
        doctor_id: i64,
        fecha: NaiveDate,
    },
    ReviewingNote {
        doctor_id: i64,
        fecha: NaiveDate,
        hora: NaiveTime,
        nota: Option<String>,
        /// Message from the last failed submit, shown above the form.
        error: Option<String>,
    },
    Submitting {
        doctor_id: i64,
        fecha: NaiveDate,
        hora: NaiveTime,
        nota: Option<String>,
    },
    Confirmed {
        cita: CitaDetalle,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum BookingError {
    #[error("no se puede reservar en una fecha pasada ({0})")]
    PastDate(NaiveDate),
    #[error("acción no válida en el paso actual")]
    WrongStep,
}

#[derive(Debug, Clone)]
pub struct BookingFlow {
    paciente_id: i64,
    state: BookingState,
}

impl BookingFlow {
    pub fn new(paciente_id: i64) -> Self {
        Self {
            paciente_id,
            state: BookingState::SelectingSpecialist,
        }
    }

    pub fn state(&self) -> &BookingState {
        &self.state
    }

    /// Picking a specialist is allowed from any pre-submit step and
    /// discards later selections.
    pub fn select_specialist(&mut self, doctor_id: i64) -> Result<(), BookingError> {
        match self.state {
            BookingState::Submitting { .. } | BookingState::Confirmed { .. } => {
                Err(BookingError::WrongStep)
            }
            _ => {
                self.state = BookingState::SelectingDate { doctor_id };
                Ok(())
            }
        }
    }

    pub fn select_date(&mut self, fecha: NaiveDate, today: NaiveDate) -> Result<(), BookingError> {
        let doctor_id = match self.state {
            BookingState::SelectingDate { doctor_id }
            | BookingState::SelectingTime { doctor_id, .. } => doctor_id,
            _ => return Err(BookingError::WrongStep),
        };
        if fecha < today {
            return Err(BookingError::PastDate(fecha));
        }
        self.state = BookingState::SelectingTime { doctor_id, fecha };
        Ok(())
    }

    pub fn select_time(&mut self, hora: NaiveTime) -> Result<(), BookingError> {
        let BookingState::SelectingTime { doctor_id, fecha } = self.state else {
            return Err(BookingError::WrongStep);
        };
        self.state = BookingState::ReviewingNote {
            doctor_id,
            fecha,
            hora,
            nota: None,
            error: None,
        };
        Ok(())
    }

    /// Blank notes are stored as `None`.
    pub fn set_note(&mut self, text: &str) -> Result<(), BookingError> {
        let BookingState::ReviewingNote { nota, .. } = &mut self.state else {
            return Err(BookingError::WrongStep);
        };
        let trimmed = text.trim();
        *nota = (!trimmed.is_empty()).then(|| trimmed.to_string());
        Ok(())
    }

    /// Moves to `Submitting` and returns the body for `POST /api/citas`.
    pub fn submit(&mut self) -> Result<CrearCitaRequest, BookingError> {
        let (doctor_id, fecha, hora, nota) = match &self.state {
            BookingState::ReviewingNote {
                doctor_id,
                fecha,
                hora,
                nota,
                ..
            } => (*doctor_id, *fecha, *hora, nota.clone()),
            _ => return Err(BookingError::WrongStep),
        };

        let body = CrearCitaRequest {
            paciente_id: Some(self.paciente_id),
            doctor_id: Some(doctor_id),
            fecha: Some(fmt_fecha(fecha)),
            hora: Some(fmt_hora(hora)),
            nota: nota.clone(),
        };
        self.state = BookingState::Submitting {
            doctor_id,
            fecha,
            hora,
            nota,
        };
        Ok(body)
    }

    pub fn confirm(&mut self, cita: CitaDetalle) -> Result<(), BookingError> {
        if !matches!(self.state, BookingState::Submitting { .. }) {
            return Err(BookingError::WrongStep);
        }
        self.state = BookingState::Confirmed { cita };
        Ok(())
    }

    /// A failed request returns to the note step with every selection kept.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), BookingError> {
        let BookingState::Submitting {
            doctor_id,
            fecha,
            hora,
            nota,
        } = &mut self.state
        else {
            return Err(BookingError::WrongStep);
        };
        self.state = BookingState::ReviewingNote {
            doctor_id: *doctor_id,
            fecha: *fecha,
            hora: *hora,
            nota: nota.take(),
            error: Some(message.into()),
        };
        Ok(())
    }

    pub fn back(&mut self) -> Result<(), BookingError> {
        self.state = match &self.state {
            BookingState::SelectingDate { .. } => BookingState::SelectingSpecialist,
            BookingState::SelectingTime { doctor_id, .. } => BookingState::SelectingDate {
                doctor_id: *doctor_id,
            },
            BookingState::ReviewingNote {
                doctor_id, fecha, ..
            } => BookingState::SelectingTime {
                doctor_id: *doctor_id,
                fecha: *fecha,
            },
            _ => return Err(BookingError::WrongStep),
        };
        Ok(())
    }

    /// Closing the dialog (after confirmation or not) clears everything.
    pub fn close(&mut self) {
        self.state = BookingState::SelectingSpecialist;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DoctorBrief, EstadoCita, PacienteBrief};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn cita_from(body: &CrearCitaRequest) -> CitaDetalle {
        CitaDetalle {
            id: 7,
            paciente_id: body.paciente_id.unwrap(),
            doctor_id: body.doctor_id.unwrap(),
            fecha: body.fecha.clone().unwrap(),
            hora: body.hora.clone().unwrap(),
            estado: EstadoCita::Programada,
            nota: body.nota.clone(),
            fecha_creacion: "2025-11-20T10:00:00Z".into(),
            fecha_actualizacion: "2025-11-20T10:00:00Z".into(),
            paciente: PacienteBrief {
                nombre_completo: "Ana Pérez".into(),
                correo: "ana@x.com".into(),
            },
            doctor: DoctorBrief {
                nombre_completo: "Luis Gómez".into(),
                correo: "luis@x.com".into(),
                especialidad: "Ortodoncia".into(),
            },
            doctor_usuario_id: 0,
        }
    }

    fn ready(flow: &mut BookingFlow) {
        flow.select_specialist(2).unwrap();
        flow.select_date(d("2025-12-01"), d("2025-11-20")).unwrap();
        flow.select_time(t("09:00")).unwrap();
    }

    #[test]
    fn happy_path_produces_request_and_confirms() {
        let mut flow = BookingFlow::new(4);
        ready(&mut flow);
        flow.set_note("  dolor en muela  ").unwrap();

        let body = flow.submit().unwrap();
        assert_eq!(
            body,
            CrearCitaRequest {
                paciente_id: Some(4),
                doctor_id: Some(2),
                fecha: Some("2025-12-01".into()),
                hora: Some("09:00".into()),
                nota: Some("dolor en muela".into()),
            }
        );
        assert!(matches!(flow.state(), BookingState::Submitting { .. }));

        let cita = cita_from(&body);
        flow.confirm(cita.clone()).unwrap();
        assert_eq!(flow.state(), &BookingState::Confirmed { cita });

        flow.close();
        assert_eq!(flow.state(), &BookingState::SelectingSpecialist);
    }

    #[test]
    fn past_dates_are_refused_but_today_is_fine() {
        let mut flow = BookingFlow::new(4);
        flow.select_specialist(2).unwrap();
        assert_eq!(
            flow.select_date(d("2025-11-19"), d("2025-11-20")),
            Err(BookingError::PastDate(d("2025-11-19")))
        );
        assert_eq!(flow.state(), &BookingState::SelectingDate { doctor_id: 2 });
        flow.select_date(d("2025-11-20"), d("2025-11-20")).unwrap();
    }

    #[test]
    fn submit_needs_every_selection() {
        let mut flow = BookingFlow::new(4);
        assert_eq!(flow.submit(), Err(BookingError::WrongStep));
        flow.select_specialist(2).unwrap();
        assert_eq!(flow.submit(), Err(BookingError::WrongStep));
        flow.select_date(d("2025-12-01"), d("2025-11-20")).unwrap();
        assert_eq!(flow.submit(), Err(BookingError::WrongStep));
        flow.select_time(t("09:00")).unwrap();
        let body = flow.submit().unwrap();
        assert_eq!(body.nota, None);
    }

    #[test]
    fn failure_returns_to_note_with_selections_and_message() {
        let mut flow = BookingFlow::new(4);
        ready(&mut flow);
        flow.set_note("revisión").unwrap();
        flow.submit().unwrap();
        flow.fail("El doctor ya tiene una cita en ese horario").unwrap();

        match flow.state() {
            BookingState::ReviewingNote {
                doctor_id,
                hora,
                nota,
                error,
                ..
            } => {
                assert_eq!(*doctor_id, 2);
                assert_eq!(*hora, t("09:00"));
                assert_eq!(nota.as_deref(), Some("revisión"));
                assert!(error.as_deref().unwrap().contains("ya tiene una cita"));
            }
            other => panic!("unexpected state {other:?}"),
        }

        // retry works from there
        flow.submit().unwrap();
    }

    #[test]
    fn back_steps_keep_earlier_choices() {
        let mut flow = BookingFlow::new(4);
        ready(&mut flow);
        flow.back().unwrap();
        assert_eq!(
            flow.state(),
            &BookingState::SelectingTime {
                doctor_id: 2,
                fecha: d("2025-12-01")
            }
        );
        flow.back().unwrap();
        flow.back().unwrap();
        assert_eq!(flow.state(), &BookingState::SelectingSpecialist);
        assert_eq!(flow.back(), Err(BookingError::WrongStep));
    }

    #[test]
    fn nothing_changes_while_submitting() {
        let mut flow = BookingFlow::new(4);
        ready(&mut flow);
        flow.submit().unwrap();
        assert_eq!(flow.select_specialist(3), Err(BookingError::WrongStep));
        assert_eq!(flow.set_note("x"), Err(BookingError::WrongStep));
        assert_eq!(flow.back(), Err(BookingError::WrongStep));
    }
}
