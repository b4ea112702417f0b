use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AwsError {
    #[error("`{program}` not found. Install the AWS CLI from https://aws.amazon.com/cli/")]
    NotInstalled { program: String },

    #[error("Not authenticated with AWS ({message}). Run `aws configure` or `aws sso login` first.")]
    NotAuthenticated { message: String },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("Invalid JSON from `{command}`: {message}")]
    InvalidJson { command: String, message: String },

    #[error("Failed to run `{program}`: {message}")]
    Io { program: String, message: String },
}
