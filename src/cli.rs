//! Command-line interface definitions.
//!
//! Credentials can be passed as flags or environment variables
//! (`CANVAS_TOKEN`, `GRADESCOPE_EMAIL`, `GRADESCOPE_PASSWORD`); the latter
//! keeps passwords out of shell history.
//!
//! # Examples
//!
//! ```sh
//! # Canvas courses for the current term
//! course_sync courses --platform canvas --term-filter "fall 2025"
//!
//! # All Gradescope assignments across courses
//! GRADESCOPE_EMAIL=me@school.edu GRADESCOPE_PASSWORD=... \
//!     course_sync assignments --platform gradescope
//!
//! # One course's assignments
//! course_sync assignments --platform gradescope --course-id 123456
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use course_sync::{Credentials, Platform};

/// Command-line arguments for course_sync.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List courses as universal JSON records
    Courses {
        #[command(flatten)]
        auth: AuthArgs,

        /// Keep only courses whose term contains every word of the filter
        #[arg(short, long, default_value = "")]
        term_filter: String,
    },

    /// List assignments as universal JSON records
    Assignments {
        #[command(flatten)]
        auth: AuthArgs,

        /// Platform-native course id; omit to fetch every course
        #[arg(short, long)]
        course_id: Option<String>,
    },

    /// Check whether the credentials authenticate
    TestConnection {
        #[command(flatten)]
        auth: AuthArgs,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Canvas,
    Gradescope,
}

impl From<PlatformArg> for Platform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::Canvas => Platform::Canvas,
            PlatformArg::Gradescope => Platform::Gradescope,
        }
    }
}

/// Platform selection plus whichever credential flags that platform needs.
#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Which platform to talk to
    #[arg(short, long, value_enum)]
    pub platform: PlatformArg,

    /// Canvas access token
    #[arg(long, env = "CANVAS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Gradescope account email
    #[arg(long, env = "GRADESCOPE_EMAIL")]
    pub email: Option<String>,

    /// Gradescope account password
    #[arg(long, env = "GRADESCOPE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl AuthArgs {
    /// Build the credential variant the platform expects; missing flags are
    /// reported by name.
    pub fn credentials(&self) -> Result<Credentials, String> {
        match self.platform {
            PlatformArg::Canvas => match &self.token {
                Some(token) => Ok(Credentials::Token {
                    token: token.clone(),
                }),
                None => Err("canvas requires --token (or CANVAS_TOKEN)".to_string()),
            },
            PlatformArg::Gradescope => match (&self.email, &self.password) {
                (Some(email), Some(password)) => Ok(Credentials::Password {
                    email: email.clone(),
                    password: password.clone(),
                }),
                _ => Err(
                    "gradescope requires --email and --password (or GRADESCOPE_EMAIL/GRADESCOPE_PASSWORD)"
                        .to_string(),
                ),
            },
        }
    }
}
