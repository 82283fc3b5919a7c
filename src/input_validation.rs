//! Input validation for user-supplied settings values
//!
//! Syntactic checks on path and host strings before they reach the
//! filesystem or an external command.

use crate::error::{CopierError, CopierResult};

/// Maximum allowed path length in bytes
const MAX_PATH_LENGTH: usize = 4096;

/// Maximum length of a DNS name
const MAX_HOST_LENGTH: usize = 253;

/// Validate a path argument
///
/// Rejects empty values, overlong values and embedded NUL bytes.
pub fn validate_path_argument(field: &'static str, path: &str) -> CopierResult<()> {
    if path.trim().is_empty() {
        return Err(CopierError::InvalidInput {
            field,
            reason: "must not be empty",
        });
    }

    if path.len() > MAX_PATH_LENGTH {
        return Err(CopierError::InvalidInput {
            field,
            reason: "path too long (max 4096 bytes)",
        });
    }

    if path.contains('\0') {
        return Err(CopierError::InvalidInput {
            field,
            reason: "path contains null byte",
        });
    }

    Ok(())
}

/// Validate a network host name or IP literal
///
/// The ping probe hands the host to an external command, so anything outside
/// a conservative hostname / IPv4 / IPv6 alphabet is refused.
pub fn validate_network_host(host: &str) -> CopierResult<()> {
    let trimmed = host.trim();

    if trimmed.is_empty() {
        return Err(CopierError::InvalidInput {
            field: "network_ip",
            reason: "must not be empty",
        });
    }

    if trimmed.len() > MAX_HOST_LENGTH {
        return Err(CopierError::InvalidInput {
            field: "network_ip",
            reason: "host too long (max 253 chars)",
        });
    }

    if trimmed.starts_with('-') {
        return Err(CopierError::InvalidInput {
            field: "network_ip",
            reason: "host must not start with '-'",
        });
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']' | '_'))
    {
        return Err(CopierError::InvalidInput {
            field: "network_ip",
            reason: "host contains invalid characters",
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path_argument_valid() {
        assert!(validate_path_argument("source_path", "/Users/test/projects").is_ok());
        assert!(validate_path_argument("destination_path", "\\\\nas\\share\\backup").is_ok());
    }

    #[test]
    fn test_validate_path_argument_invalid() {
        assert!(validate_path_argument("source_path", "").is_err());
        assert!(validate_path_argument("source_path", "   ").is_err());
        assert!(validate_path_argument("source_path", "/path\0with\0null").is_err());
    }

    #[test]
    fn test_validate_path_argument_too_long() {
        let long_path = "/".repeat(5000);
        assert!(validate_path_argument("source_path", &long_path).is_err());
    }

    #[test]
    fn test_validate_network_host_valid() {
        assert!(validate_network_host("192.168.1.20").is_ok());
        assert!(validate_network_host("nas.local").is_ok());
        assert!(validate_network_host("fe80::1").is_ok());
        assert!(validate_network_host(" fileserver ").is_ok());
    }

    #[test]
    fn test_validate_network_host_invalid() {
        assert!(validate_network_host("").is_err());
        assert!(validate_network_host("-c 100 host").is_err());
        assert!(validate_network_host("host; rm -rf /").is_err());
        assert!(validate_network_host("host`whoami`").is_err());
        assert!(validate_network_host("$HOST").is_err());
    }

    #[test]
    fn test_validate_network_host_too_long() {
        let long_host = "a".repeat(254);
        let err = validate_network_host(&long_host).unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_INPUT");
    }
}
