//! Sign-in-with-Ethereum (EIP-4361) message type.
//!
//! The wallet signs the rendered text of a [`SiweMessage`] as a personal
//! message. The server parses the same text back, so `Display` and `FromStr`
//! follow the EIP-4361 layout line by line.

use alloy::primitives::Address;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const URI_TAG: &str = "URI: ";
const VERSION_TAG: &str = "Version: ";
const CHAIN_TAG: &str = "Chain ID: ";
const NONCE_TAG: &str = "Nonce: ";
const ISSUED_AT_TAG: &str = "Issued At: ";
const EXPIRATION_TAG: &str = "Expiration Time: ";
const NOT_BEFORE_TAG: &str = "Not Before: ";
const REQUEST_ID_TAG: &str = "Request ID: ";
const RESOURCES_TAG: &str = "Resources:";

/// Errors raised while parsing a sign-in message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SiweError {
	#[error("Missing line: {0}")]
	Missing(&'static str),
	#[error("Invalid {field}: {message}")]
	Invalid {
		field: &'static str,
		message: String,
	},
	#[error("Unsupported version: {0}")]
	UnsupportedVersion(String),
}

/// A sign-in request bound to a domain, an address and a server nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
	pub domain: String,
	pub address: Address,
	pub statement: Option<String>,
	pub uri: String,
	pub version: String,
	pub chain_id: u64,
	pub nonce: String,
	pub issued_at: DateTime<Utc>,
	pub expiration_time: Option<DateTime<Utc>>,
	pub not_before: Option<DateTime<Utc>>,
	pub request_id: Option<String>,
	pub resources: Vec<String>,
}

impl SiweMessage {
	/// Builds a version 1 message issued now.
	pub fn new(
		domain: impl Into<String>,
		address: Address,
		statement: Option<String>,
		uri: impl Into<String>,
		chain_id: u64,
		nonce: impl Into<String>,
	) -> Self {
		Self {
			domain: domain.into(),
			address,
			statement,
			uri: uri.into(),
			version: "1".to_string(),
			chain_id,
			nonce: nonce.into(),
			issued_at: Utc::now(),
			expiration_time: None,
			not_before: None,
			request_id: None,
			resources: Vec::new(),
		}
	}

	/// Whether `now` falls inside the message's validity window.
	pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
		let not_expired = self.expiration_time.is_none_or(|exp| now < exp);
		let started = self.not_before.is_none_or(|nbf| now >= nbf);
		not_expired && started
	}
}

/// Nonces are at least eight alphanumeric characters.
pub fn is_valid_nonce(nonce: &str) -> bool {
	nonce.len() >= 8 && nonce.chars().all(|c| c.is_ascii_alphanumeric())
}

fn timestamp(value: &DateTime<Utc>) -> String {
	value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl fmt::Display for SiweMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}{}", self.domain, HEADER_SUFFIX)?;
		writeln!(f, "{}", self.address.to_checksum(None))?;
		writeln!(f)?;
		if let Some(statement) = &self.statement {
			writeln!(f, "{}", statement)?;
		}
		writeln!(f)?;
		writeln!(f, "{}{}", URI_TAG, self.uri)?;
		writeln!(f, "{}{}", VERSION_TAG, self.version)?;
		writeln!(f, "{}{}", CHAIN_TAG, self.chain_id)?;
		writeln!(f, "{}{}", NONCE_TAG, self.nonce)?;
		write!(f, "{}{}", ISSUED_AT_TAG, timestamp(&self.issued_at))?;
		if let Some(exp) = &self.expiration_time {
			write!(f, "\n{}{}", EXPIRATION_TAG, timestamp(exp))?;
		}
		if let Some(nbf) = &self.not_before {
			write!(f, "\n{}{}", NOT_BEFORE_TAG, timestamp(nbf))?;
		}
		if let Some(id) = &self.request_id {
			write!(f, "\n{}{}", REQUEST_ID_TAG, id)?;
		}
		if !self.resources.is_empty() {
			write!(f, "\n{}", RESOURCES_TAG)?;
			for resource in &self.resources {
				write!(f, "\n- {}", resource)?;
			}
		}
		Ok(())
	}
}

fn parse_time(field: &'static str, value: &str) -> Result<DateTime<Utc>, SiweError> {
	DateTime::parse_from_rfc3339(value)
		.map(|t| t.with_timezone(&Utc))
		.map_err(|e| SiweError::Invalid {
			field,
			message: e.to_string(),
		})
}

fn tagged<'a>(line: Option<&'a str>, tag: &'static str) -> Result<&'a str, SiweError> {
	line.and_then(|l| l.strip_prefix(tag))
		.ok_or(SiweError::Missing(tag.trim_end_matches(": ")))
}

impl FromStr for SiweMessage {
	type Err = SiweError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut lines = s.lines().peekable();

		let domain = lines
			.next()
			.and_then(|l| l.strip_suffix(HEADER_SUFFIX))
			.filter(|d| !d.is_empty())
			.ok_or(SiweError::Missing("domain"))?
			.to_string();

		let address_line = lines.next().ok_or(SiweError::Missing("address"))?;
		let address =
			Address::parse_checksummed(address_line, None).map_err(|e| SiweError::Invalid {
				field: "address",
				message: e.to_string(),
			})?;

		// Statement block: blank line, optional statement, blank line.
		let mut statement = None;
		while let Some(line) = lines.peek() {
			if line.starts_with(URI_TAG) {
				break;
			}
			let line = lines.next().unwrap_or_default();
			if !line.is_empty() {
				if statement.is_some() {
					return Err(SiweError::Invalid {
						field: "statement",
						message: "statement must be a single line".to_string(),
					});
				}
				statement = Some(line.to_string());
			}
		}

		let uri = tagged(lines.next(), URI_TAG)?.to_string();
		let version = tagged(lines.next(), VERSION_TAG)?.to_string();
		if version != "1" {
			return Err(SiweError::UnsupportedVersion(version));
		}
		let chain_id = tagged(lines.next(), CHAIN_TAG)?
			.parse::<u64>()
			.map_err(|e| SiweError::Invalid {
				field: "chain id",
				message: e.to_string(),
			})?;
		let nonce = tagged(lines.next(), NONCE_TAG)?.to_string();
		if !is_valid_nonce(&nonce) {
			return Err(SiweError::Invalid {
				field: "nonce",
				message: "expected at least 8 alphanumeric characters".to_string(),
			});
		}
		let issued_at = parse_time("issued at", tagged(lines.next(), ISSUED_AT_TAG)?)?;

		let mut message = SiweMessage {
			domain,
			address,
			statement,
			uri,
			version,
			chain_id,
			nonce,
			issued_at,
			expiration_time: None,
			not_before: None,
			request_id: None,
			resources: Vec::new(),
		};

		while let Some(line) = lines.next() {
			if let Some(value) = line.strip_prefix(EXPIRATION_TAG) {
				message.expiration_time = Some(parse_time("expiration time", value)?);
			} else if let Some(value) = line.strip_prefix(NOT_BEFORE_TAG) {
				message.not_before = Some(parse_time("not before", value)?);
			} else if let Some(value) = line.strip_prefix(REQUEST_ID_TAG) {
				message.request_id = Some(value.to_string());
			} else if line == RESOURCES_TAG {
				for resource in lines.by_ref() {
					let uri = resource.strip_prefix("- ").ok_or(SiweError::Invalid {
						field: "resources",
						message: format!("unexpected line '{}'", resource),
					})?;
					message.resources.push(uri.to_string());
				}
			} else if !line.is_empty() {
				return Err(SiweError::Invalid {
					field: "message",
					message: format!("unexpected line '{}'", line),
				});
			}
		}

		Ok(message)
	}
}
