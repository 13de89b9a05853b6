//! Input validation with Spanish, per-field messages.

use regex::Regex;
use std::sync::OnceLock;

use super::error::{DomainResult, FieldErrorsBuilder};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const PHONE_PATTERN: &str = r"^\+?[1-9]\d{1,14}$";

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_FULL_NAME_LEN: usize = 3;
pub const MIN_CONTACT_MESSAGE_LEN: usize = 10;
pub const MAX_CONTACT_MESSAGE_LEN: usize = 2_000;
pub const MIN_REASON_LEN: usize = 10;
pub const MAX_REASON_LEN: usize = 500;
pub const MAX_TESTIMONIAL_TITLE_LEN: usize = 120;
pub const MIN_TESTIMONIAL_COMMENT_LEN: usize = 20;
pub const MAX_TESTIMONIAL_COMMENT_LEN: usize = 1_000;

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn email_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, EMAIL_PATTERN)
}

fn phone_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, PHONE_PATTERN)
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(email.trim()))
}

/// Phone in international form; spaces, dashes and parentheses are ignored.
pub fn is_valid_phone(phone: &str) -> bool {
    let compact: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    phone_regex().is_some_and(|re| re.is_match(&compact))
}

/// Messages for every password rule that is not met.
pub fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push("La contraseña debe tener al menos 8 caracteres");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("Debe contener al menos una mayúscula");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("Debe contener al menos una minúscula");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Debe contener al menos un número");
    }
    problems
}

pub fn check_email(errors: &mut FieldErrorsBuilder, field: &str, email: &str) {
    errors.check(is_valid_email(email), field, "Email inválido");
}

pub fn check_full_name(errors: &mut FieldErrorsBuilder, field: &str, name: &str) {
    errors.check(
        name.trim().chars().count() >= MIN_FULL_NAME_LEN,
        field,
        "El nombre debe tener al menos 3 caracteres",
    );
}

pub fn check_optional_phone(errors: &mut FieldErrorsBuilder, field: &str, phone: Option<&str>) {
    if let Some(phone) = phone.filter(|p| !p.trim().is_empty()) {
        errors.check(is_valid_phone(phone), field, "Teléfono inválido");
    }
}

/// Registration payload: email, password strength, name and optional phone.
pub fn validate_registration(
    email: &str,
    password: &str,
    full_name: &str,
    phone: Option<&str>,
) -> DomainResult<()> {
    let mut errors = FieldErrorsBuilder::new();
    check_email(&mut errors, "email", email);
    for problem in password_problems(password) {
        errors.push("password", problem);
    }
    check_full_name(&mut errors, "full_name", full_name);
    check_optional_phone(&mut errors, "phone", phone);
    errors.finish()
}

pub fn validate_contact(
    name: &str,
    email: &str,
    phone: Option<&str>,
    subject: &str,
    message: &str,
) -> DomainResult<()> {
    let mut errors = FieldErrorsBuilder::new();
    errors.check(
        name.trim().chars().count() >= 2,
        "name",
        "El nombre debe tener al menos 2 caracteres",
    );
    check_email(&mut errors, "email", email);
    check_optional_phone(&mut errors, "phone", phone);
    errors.check(!subject.trim().is_empty(), "subject", "El asunto es requerido");
    let len = message.trim().chars().count();
    errors.check(
        len >= MIN_CONTACT_MESSAGE_LEN,
        "message",
        "El mensaje debe tener al menos 10 caracteres",
    );
    errors.check(
        len <= MAX_CONTACT_MESSAGE_LEN,
        "message",
        "Máximo 2000 caracteres",
    );
    errors.finish()
}

/// Cancellation or refund reason: 10 to 500 characters.
pub fn validate_reason(reason: &str) -> DomainResult<()> {
    let len = reason.trim().chars().count();
    let mut errors = FieldErrorsBuilder::new();
    errors.check(
        len >= MIN_REASON_LEN,
        "reason",
        "La razón debe tener al menos 10 caracteres",
    );
    errors.check(len <= MAX_REASON_LEN, "reason", "Máximo 500 caracteres");
    errors.finish()
}

/// Testimonial submission: name, email, 1 to 5 stars, title and comment.
pub fn validate_testimonial(
    name: &str,
    email: &str,
    rating: u8,
    title: &str,
    comment: &str,
) -> DomainResult<()> {
    let mut errors = FieldErrorsBuilder::new();
    errors.check(
        name.trim().chars().count() >= 2,
        "user_name",
        "El nombre debe tener al menos 2 caracteres",
    );
    check_email(&mut errors, "user_email", email);
    errors.check(
        (1..=5).contains(&rating),
        "rating",
        "La calificación debe estar entre 1 y 5",
    );
    let title_len = title.trim().chars().count();
    errors.check(title_len > 0, "title", "El título es requerido");
    errors.check(
        title_len <= MAX_TESTIMONIAL_TITLE_LEN,
        "title",
        "Máximo 120 caracteres",
    );
    let len = comment.trim().chars().count();
    errors.check(
        len >= MIN_TESTIMONIAL_COMMENT_LEN,
        "comment",
        "El comentario debe tener al menos 20 caracteres",
    );
    errors.check(
        len <= MAX_TESTIMONIAL_COMMENT_LEN,
        "comment",
        "Máximo 1000 caracteres",
    );
    errors.finish()
}

/// Week numbers must name an ISO week of a 52-week supply year.
pub fn check_week_numbers(errors: &mut FieldErrorsBuilder, field: &str, weeks: &[u32]) {
    errors.check(
        !weeks.is_empty() && weeks.iter().all(|w| (1..=52).contains(w)),
        field,
        "Las semanas deben estar entre 1 y 52",
    );
}
