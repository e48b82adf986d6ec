//! Newline-delimited JSON transport.
//!
//! One request per line, tagged by `op`; one response per line, tagged by
//! `result`. The transport owns everything guest-facing: request parsing,
//! reservation policy, default availability windows, and mapping engine
//! errors to stable kinds and codes.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, Months, NaiveDate};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::limits::MAX_REQUEST_LINE_LEN;
use crate::model::{Booking, BookingPatch};
use crate::observability;
use crate::policy::{PolicyViolation, ReservationPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Create {
        guest_email: String,
        guest_name: String,
        arrival: NaiveDate,
        departure: NaiveDate,
    },
    Get {
        id: Ulid,
    },
    List {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guest_email: Option<String>,
    },
    Update {
        id: Ulid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guest_email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guest_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arrival: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        departure: Option<NaiveDate>,
    },
    Cancel {
        id: Ulid,
    },
    Availability {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    Booking {
        booking: Booking,
    },
    Bookings {
        bookings: Vec<Booking>,
    },
    Availability {
        from: NaiveDate,
        to: NaiveDate,
        available_days: Vec<NaiveDate>,
    },
    Error {
        kind: ErrorKind,
        code: u16,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRange,
    InvalidRequest,
    PolicyViolation,
    LimitExceeded,
    NotFound,
    NotModifiable,
    UnavailableDates,
    StorageUnavailable,
}

impl ErrorKind {
    /// HTTP-style status code.
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::BadRange
            | ErrorKind::InvalidRequest
            | ErrorKind::PolicyViolation
            | ErrorKind::LimitExceeded => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::NotModifiable => 405,
            ErrorKind::UnavailableDates => 409,
            ErrorKind::StorageUnavailable => 503,
        }
    }
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            kind,
            code: kind.code(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

impl From<EngineError> for Response {
    fn from(e: EngineError) -> Self {
        let kind = match &e {
            EngineError::BadRange => ErrorKind::BadRange,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::NotModifiable(_) => ErrorKind::NotModifiable,
            EngineError::UnavailableDates { .. } => ErrorKind::UnavailableDates,
            EngineError::LimitExceeded(_) => ErrorKind::LimitExceeded,
            EngineError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
        };
        Response::error(kind, e.to_string())
    }
}

impl From<PolicyViolation> for Response {
    fn from(v: PolicyViolation) -> Self {
        Response::error(ErrorKind::PolicyViolation, v.to_string())
    }
}

/// Default availability window: `from` defaults to tomorrow, `to` to one month after `from`.
pub fn availability_window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let from = from.unwrap_or_else(|| today.succ_opt().unwrap_or(today));
    let to = to.unwrap_or_else(|| from.checked_add_months(Months::new(1)).unwrap_or(from));
    (from, to)
}

/// Execute one request. `policy` is `None` when guest-facing rules are disabled.
pub async fn dispatch(
    engine: &Engine,
    policy: Option<&ReservationPolicy>,
    today: NaiveDate,
    request: Request,
) -> Response {
    match request {
        Request::Create {
            guest_email,
            guest_name,
            arrival,
            departure,
        } => {
            if let Some(policy) = policy
                && let Err(v) =
                    policy.check_new(&guest_email, &guest_name, arrival, departure, today)
            {
                return v.into();
            }
            match engine.create(guest_email, guest_name, arrival, departure).await {
                Ok(booking) => Response::Booking { booking },
                Err(e) => e.into(),
            }
        }
        Request::Get { id } => match engine.get(id).await {
            Ok(booking) => Response::Booking { booking },
            Err(e) => e.into(),
        },
        Request::List { guest_email } => {
            let result = match guest_email {
                Some(email) => engine.list_by_guest_email(&email).await,
                None => engine.list_all().await,
            };
            match result {
                Ok(bookings) => Response::Bookings { bookings },
                Err(e) => e.into(),
            }
        }
        Request::Update {
            id,
            guest_email,
            guest_name,
            arrival,
            departure,
        } => {
            let patch = BookingPatch {
                guest_email,
                guest_name,
                arrival,
                departure,
            };
            if let Some(policy) = policy {
                let current = if patch.touches_dates() {
                    match engine.get(id).await {
                        Ok(booking) => booking.is_active().then_some(booking.stay),
                        Err(e) => return e.into(),
                    }
                } else {
                    None
                };
                if let Err(v) = policy.check_update(&patch, current.as_ref(), today) {
                    return v.into();
                }
            }
            match engine.update(id, patch).await {
                Ok(booking) => Response::Booking { booking },
                Err(e) => e.into(),
            }
        }
        Request::Cancel { id } => match engine.cancel(id).await {
            Ok(booking) => Response::Booking { booking },
            Err(e) => e.into(),
        },
        Request::Availability { from, to } => {
            let (from, to) = availability_window(from, to, today);
            if let Some(policy) = policy
                && let Err(v) = policy.check_window(from, to, today)
            {
                return v.into();
            }
            match engine.find_available_days(from, to).await {
                Ok(available_days) => Response::Availability {
                    from,
                    to,
                    available_days,
                },
                Err(e) => e.into(),
            }
        }
    }
}

/// Serve one client until it disconnects. An over-long request line gets an
/// `invalid_request` response and closes the connection.
pub async fn process_connection<S>(
    socket: S,
    engine: Arc<Engine>,
    policy: Option<ReservationPolicy>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut lines = Framed::new(socket, LinesCodec::new_with_max_length(MAX_REQUEST_LINE_LEN));

    while let Some(line) = lines.next().await {
        match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                let response = handle_line(&engine, policy.as_ref(), &line).await;
                send_response(&mut lines, &response).await?;
            }
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!("request line over {MAX_REQUEST_LINE_LEN} bytes, closing connection");
                let response = Response::error(ErrorKind::InvalidRequest, "request line too long");
                send_response(&mut lines, &response).await?;
                return Ok(());
            }
            Err(LinesCodecError::Io(e)) => return Err(e),
        }
    }
    Ok(())
}

async fn send_response<S>(lines: &mut Framed<S, LinesCodec>, response: &Response) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let out = serde_json::to_string(response).map_err(io::Error::other)?;
    lines.send(out).await.map_err(|e| match e {
        LinesCodecError::Io(e) => e,
        other => io::Error::other(other),
    })
}

async fn handle_line(engine: &Engine, policy: Option<&ReservationPolicy>, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            debug!("unparseable request: {e}");
            metrics::counter!(observability::REQUESTS_TOTAL, "op" => "unknown", "status" => "error")
                .increment(1);
            return Response::error(ErrorKind::InvalidRequest, e.to_string());
        }
    };

    let op = observability::request_label(&request);
    let start = Instant::now();
    let today = Local::now().date_naive();
    let response = dispatch(engine, policy, today, request).await;

    let status = if response.is_error() { "error" } else { "ok" };
    metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
        .record(start.elapsed().as_secs_f64());
    response
}
