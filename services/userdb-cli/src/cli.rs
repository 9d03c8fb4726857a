//! Command-line parsing
//!
//! ```text
//! userdb [--config PATH] [--metrics] METHOD PATH [--json BODY] [METHOD PATH ...]
//! ```
//!
//! Every METHOD PATH pair is one request; all of them are sent concurrently.

use transport::Method;

use crate::error::{Error, Result};

pub const USAGE: &str = "\
usage: userdb [--config PATH] [--metrics] METHOD PATH [--json BODY] [METHOD PATH ...]

  --config PATH   config file (default: $CONFIG_PATH or userdb.toml)
  --metrics       print Prometheus metrics to stderr on exit
  --json BODY     JSON body for the preceding request
  -h, --help      show this message";

/// One request to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub json: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub config: Option<String>,
    pub metrics: bool,
    pub help: bool,
    pub requests: Vec<RequestSpec>,
}

/// Parse arguments, excluding the program name.
pub fn parse<I>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--metrics" => parsed.metrics = true,
            "--config" => parsed.config = Some(value_for("--config", args.next())?),
            "--json" => {
                let body = value_for("--json", args.next())?;
                let Some(last) = parsed.requests.last_mut() else {
                    return Err(Error::Usage("--json must follow METHOD PATH".into()));
                };
                last.json = Some(body);
            }
            flag if flag.starts_with("--") => {
                return Err(Error::Usage(format!("unknown flag {flag}")));
            }
            method => {
                let path = args
                    .next()
                    .ok_or_else(|| Error::Usage(format!("missing PATH after {method}")))?;
                parsed.requests.push(request(method, path)?);
            }
        }
    }

    Ok(parsed)
}

fn value_for(flag: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| Error::Usage(format!("{flag} needs a value")))
}

fn request(method: &str, path: String) -> Result<RequestSpec> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::Usage(format!("invalid method: {method}")))?;
    if !path.starts_with('/') {
        return Err(Error::Usage(format!("PATH must start with '/': {path}")));
    }
    Ok(RequestSpec {
        method,
        path,
        json: None,
    })
}
