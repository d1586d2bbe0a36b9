//! Path normalization between local and remote conventions
//!
//! Commands are often pasted from a local shell, so their path arguments
//! arrive in local convention: a Windows drive prefix, or an absolute macOS
//! home under `/Users`. These helpers rewrite such tokens into something the
//! remote shell can resolve. Everything here is pure string rewriting;
//! tokens that match no known convention pass through untouched, and every
//! rewrite is idempotent.

/// Home directory prefixes that collapse to `~`
const HOME_PREFIXES: [&str; 2] = ["/Users/", "/users/"];

/// Separators accepted at a prefix boundary
const SEPARATORS: [char; 2] = ['/', '\\'];

/// Normalize a single path-like value into remote convention.
///
/// Strips a leading `C:`-style drive prefix when a separator follows it,
/// then collapses a `/Users/<user>` or `/users/<user>` prefix into `~`.
#[must_use]
pub fn normalize_path(path: &str, user: &str) -> String {
    collapse_home(strip_drive(path), user)
}

/// Join command arguments into the remote command line, normalizing every
/// path-like token.
///
/// Tokens of the form `--flag=value` keep the flag and have only the value
/// rewritten, so `--manifest-path=C:/Users/alice/Cargo.toml` stays a single
/// argument.
#[must_use]
pub fn normalize_command(args: &[String], user: &str) -> String {
    args.iter()
        .map(|arg| normalize_token(arg, user))
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_token(token: &str, user: &str) -> String {
    if token.starts_with('-') {
        if let Some((flag, value)) = token.split_once('=') {
            return format!("{flag}={}", normalize_path(value, user));
        }
    }
    normalize_path(token, user)
}

/// Strip a `<letter>:` drive prefix when a separator follows.
///
/// Drive-relative forms (`C:work`) and a bare drive (`C:`) carry no usable
/// remote meaning and pass through unchanged.
fn strip_drive(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && SEPARATORS.contains(&(bytes[2] as char))
    {
        return &path[2..];
    }
    path
}

/// Collapse a recognized home prefix for `user` into `~`.
///
/// The username must end at a separator boundary, so `/Users/alicesmith` is
/// untouched when the user is `alice`.
fn collapse_home(path: &str, user: &str) -> String {
    if user.is_empty() {
        return path.to_string();
    }
    for prefix in HOME_PREFIXES {
        let home = format!("{prefix}{user}");
        if let Some(rest) = path.strip_prefix(&home) {
            if rest.is_empty() {
                return "~".to_string();
            }
            if rest.starts_with(SEPARATORS) {
                return format!("~{rest}");
            }
        }
    }
    path.to_string()
}
