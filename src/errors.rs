// Error types for equipviz

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum VisualizerError {
    // Authentication errors
    #[snafu(display("Invalid credentials"))]
    InvalidCredentials,
    #[snafu(display("Not logged in"))]
    MissingToken,
    #[snafu(display("Session rejected by the server, please log in again"))]
    TokenRejected,

    // Upload and report errors
    #[snafu(display("Upload rejected: {message}"))]
    UploadRejected { message: String },
    #[snafu(display("Report {id} not found on the server"))]
    ReportNotFound { id: i64 },
    #[snafu(display("Error reading CSV file"))]
    CsvRead { source: io::Error },
    #[snafu(display("Error saving PDF report"))]
    ReportWrite { source: io::Error },

    // Errors talking to the API server
    #[snafu(display("Request failed: {source}"))]
    Request { source: reqwest::Error },
    #[snafu(display("Server returned status {status}: {message}"))]
    UnexpectedStatus { status: u16, message: String },
    #[snafu(display("Invalid server URL: {url}"))]
    InvalidServerUrl { url: String },

    // Session storage errors
    #[snafu(display("Error accessing session file"))]
    SessionIo { source: io::Error },
    #[snafu(display("Error serializing session file"))]
    SessionSerialize { source: serde_json::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error writing config file"))]
    ConfigIo { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerialize { source: serde_json::Error },
}
