//! First-visit node enrolment.
//!
//! A GET with no fields renders the form with defaults. A submission is
//! validated and, when clean, creates the node with its scrambler and
//! first secret and persists it. Re-registering an existing domain is a
//! no-op.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use swift_core::Secret;
use swift_ring::{Node, Role};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::HandlerError;
use crate::pages::{html_response, RegisterModel};
use crate::request::{form_pairs, form_value, RequestInfo};
use crate::Services;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DATE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

/// Handles `/swift/register` for both the form render and the submission.
pub async fn handle_register(State(services): State<Arc<Services>>, req: Request) -> Response {
    match register(services, req).await {
        Ok(r) => r,
        Err(e) => e.into_response(),
    }
}

struct Submission {
    model: RegisterModel,
    starts: OffsetDateTime,
    expires: OffsetDateTime,
    role: Role,
}

async fn register(services: Arc<Services>, req: Request) -> Result<Response, HandlerError> {
    let info = RequestInfo::from_request(&req);
    let form = form_pairs(req).await?;

    let now = OffsetDateTime::now_utc();
    let mut s = Submission {
        model: RegisterModel {
            store: String::new(),
            store_names: services.store.store_names(),
            domain: info.host.clone(),
            network: String::new(),
            starts: format_date(now.date().saturating_add(time::Duration::days(1))),
            expires: format_date(add_months(now.date(), 3)),
            role: Role::Storage as u8,
            cookie_domain: info.host_without_port().to_owned(),
            secret: true,
            scramble: true,
            errors: Vec::new(),
            read_only: false,
            background_color: services.config.background_color.clone(),
            message_color: services.config.message_color.clone(),
        },
        starts: now + std::time::Duration::from_secs(24 * 60 * 60),
        expires: now + std::time::Duration::from_secs(90 * 24 * 60 * 60),
        role: Role::Storage,
    };

    // An already registered domain never re-registers.
    if services.store.get_node(&info.host).is_some() {
        s.model.read_only = true;
        let body = services.pages.register(&s.model);
        return html_response(StatusCode::OK, &body, &[], &[]);
    }

    if !form.is_empty() {
        apply_form(&mut s, &form, now);
        if s.model.errors.is_empty() {
            store_node(&services, &mut s)?;
        }
    }

    let body = services.pages.register(&s.model);
    html_response(StatusCode::OK, &body, &[], &[])
}

fn apply_form(s: &mut Submission, form: &[(String, String)], now: OffsetDateTime) {
    s.model.store = form_value(form, "store").unwrap_or("").to_owned();

    s.model.network = form_value(form, "network").unwrap_or("").to_owned();
    if s.model.network.len() <= 3 {
        s.model.errors.push((
            "network".to_owned(),
            "must be longer than 3 characters".to_owned(),
        ));
    } else if s.model.network.len() > 20 {
        s.model.errors.push((
            "network".to_owned(),
            "can not be longer than 20 characters".to_owned(),
        ));
    }

    if let Some(role) = form_value(form, "role") {
        match role.parse::<u8>().ok().and_then(|v| Role::from_u8(v).ok()) {
            Some(r) => {
                s.role = r;
                s.model.role = r as u8;
            }
            None => s
                .model
                .errors
                .push(("role".to_owned(), format!("role '{role}' invalid"))),
        }
    }

    if let Some(expires) = form_value(form, "expires") {
        match Date::parse(expires, DATE_FORMAT) {
            Ok(d) if d > now.date() => {
                s.expires = at_midnight(d);
                s.model.expires = expires.to_owned();
            }
            Ok(_) => s.model.errors.push((
                "expires".to_owned(),
                "expiry date must be in the future".to_owned(),
            )),
            Err(e) => s.model.errors.push(("expires".to_owned(), e.to_string())),
        }
    }

    if let Some(starts) = form_value(form, "starts") {
        let parsed = PrimitiveDateTime::parse(starts, DATE_TIME_FORMAT)
            .map(|p| p.assume_offset(UtcOffset::UTC))
            .or_else(|_| Date::parse(starts, DATE_FORMAT).map(at_midnight));
        match parsed {
            Ok(t) => {
                s.starts = t;
                s.model.starts = starts.to_owned();
            }
            Err(e) => s.model.errors.push(("starts".to_owned(), e.to_string())),
        }
    }

    if let Some(domain) = form_value(form, "cookieDomain") {
        if !domain.is_empty() {
            s.model.cookie_domain = domain.to_owned();
        }
    }
    s.model.secret = flag(form_value(form, "secret"), true);
    s.model.scramble = flag(form_value(form, "scramble"), true);
}

fn store_node(services: &Arc<Services>, s: &mut Submission) -> Result<(), HandlerError> {
    let scramble_key = if s.model.scramble {
        match Secret::new_random() {
            Ok(secret) => secret.key,
            Err(e) => {
                s.model.errors.push(("scramble".to_owned(), e.to_string()));
                return Ok(());
            }
        }
    } else {
        String::new()
    };

    let mut node = match Node::new(
        &s.model.network,
        &s.model.domain,
        OffsetDateTime::now_utc(),
        s.starts,
        s.expires,
        s.role,
        &scramble_key,
        &s.model.cookie_domain,
    ) {
        Ok(n) => n,
        Err(e) => {
            s.model.errors.push(("domain".to_owned(), e.to_string()));
            return Ok(());
        }
    };

    if s.model.secret {
        match Secret::new_random() {
            Ok(secret) => node.add_secret(secret),
            Err(e) => {
                s.model.errors.push(("secret".to_owned(), e.to_string()));
                return Ok(());
            }
        }
    }

    match services.store.set_nodes(&s.model.store, vec![node]) {
        Ok(()) => s.model.read_only = true,
        Err(e) => s.model.errors.push(("store".to_owned(), e.to_string())),
    }
    Ok(())
}

fn flag(value: Option<&str>, default: bool) -> bool {
    match value {
        Some(v) => matches!(v, "true" | "yes" | "1"),
        None => default,
    }
}

fn at_midnight(d: Date) -> OffsetDateTime {
    OffsetDateTime::new_in_offset(d, Time::MIDNIGHT, UtcOffset::UTC)
}

fn format_date(d: Date) -> String {
    d.format(DATE_FORMAT).unwrap_or_default()
}

fn add_months(d: Date, months: u8) -> Date {
    let mut out = d;
    for _ in 0..months {
        let days = time::util::days_in_year_month(out.year(), out.month());
        out = out.saturating_add(time::Duration::days(i64::from(days)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing() {
        assert!(flag(None, true));
        assert!(!flag(None, false));
        assert!(flag(Some("true"), false));
        assert!(flag(Some("yes"), false));
        assert!(flag(Some("1"), false));
        assert!(!flag(Some("false"), true));
        assert!(!flag(Some("no"), true));
    }

    #[test]
    fn add_months_advances() {
        let d = Date::from_calendar_date(2023, time::Month::November, 15).unwrap();
        let later = add_months(d, 3);
        assert!(later > d);
        assert!((later.to_julian_day() - d.to_julian_day()) >= 89);
    }
}
