// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Forensic analysis: the seam to an external tamper detector.
//
// The detector is a black box returning a manipulation likelihood in
// [0, 1]. The engine bounds each call with a timeout and treats failures as
// "no evidence" (Suspect), never as a pass.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use certitrust_core::config::ForensicConfig;
use certitrust_core::error::{CertiTrustError, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Scores an image for signs of manipulation.
#[async_trait]
pub trait ForensicAnalyzer: Send + Sync {
    /// Likelihood that `image` was manipulated, in `[0, 1]`.
    ///
    /// Errors are reported as `AnalysisUnavailable`.
    async fn score(&self, image: &[u8]) -> Result<f64>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Build the analyzer described by configuration.
pub fn analyzer_from_config(config: &ForensicConfig) -> Result<Arc<dyn ForensicAnalyzer>> {
    match &config.command {
        Some(command) => Ok(Arc::new(CommandAnalyzer::new(command)?)),
        None => Ok(Arc::new(UnavailableAnalyzer)),
    }
}

/// Used when no detector is configured: every document ends up `Suspect`
/// rather than silently `Verified`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableAnalyzer;

#[async_trait]
impl ForensicAnalyzer for UnavailableAnalyzer {
    async fn score(&self, _image: &[u8]) -> Result<f64> {
        Err(CertiTrustError::AnalysisUnavailable(
            "no forensic detector configured".into(),
        ))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Runs an external detector process per call.
///
/// The image bytes go to the child's stdin; the child must print a single
/// floating-point score on stdout and exit successfully. The child is
/// killed if the call is abandoned (for example on timeout).
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
}

impl CommandAnalyzer {
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| {
            CertiTrustError::Config("forensic command must name a program".into())
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl ForensicAnalyzer for CommandAnalyzer {
    #[instrument(skip_all, fields(program = %self.program, image_len = image.len()))]
    async fn score(&self, image: &[u8]) -> Result<f64> {
        let unavailable = |what: String| CertiTrustError::AnalysisUnavailable(what);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| unavailable(format!("cannot start {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| unavailable("detector stdin unavailable".into()))?;

        // Feed stdin while collecting output so a chatty child cannot
        // deadlock against a full pipe.
        let feed = async move {
            let written = stdin.write_all(image).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.map_err(|e| unavailable(format!("detector did not finish: {e}")))?;
        if let Err(e) = written {
            // A detector may legitimately stop reading early.
            debug!(%e, "detector closed stdin early");
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "detector failed");
            return Err(unavailable(format!("detector exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let score: f64 = stdout
            .trim()
            .parse()
            .map_err(|_| unavailable(format!("detector printed {:?}, not a score", stdout.trim())))?;

        debug!(score, "detector score");
        Ok(score)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_analyzer_always_errors() {
        let err = UnavailableAnalyzer.score(b"img").await.unwrap_err();
        assert!(matches!(err, CertiTrustError::AnalysisUnavailable(_)));
    }

    #[test]
    fn empty_command_is_config_error() {
        assert!(matches!(CommandAnalyzer::new(&[]), Err(CertiTrustError::Config(_))));
    }

    #[test]
    fn config_without_command_is_unavailable() {
        let analyzer = analyzer_from_config(&ForensicConfig::default()).unwrap();
        assert_eq!(analyzer.name(), "unavailable");
    }

    fn sh(script: &str) -> CommandAnalyzer {
        CommandAnalyzer::new(&["sh".into(), "-c".into(), script.into()]).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_score_is_parsed() {
        let score = sh("cat > /dev/null; echo ' 0.42 '").score(&[0u8; 4096]).await.unwrap();
        assert!((score - 0.42).abs() < 1e-12);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_receives_image_on_stdin() {
        // Echo back the byte count as the "score".
        let score = sh("wc -c | tr -d ' '").score(&[7u8; 3]).await.unwrap();
        assert_eq!(score, 3.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_unavailable() {
        let err = sh("cat > /dev/null; exit 3").score(b"img").await.unwrap_err();
        assert!(matches!(err, CertiTrustError::AnalysisUnavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn garbage_output_is_unavailable() {
        let err = sh("cat > /dev/null; echo maybe").score(b"img").await.unwrap_err();
        assert!(matches!(err, CertiTrustError::AnalysisUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let analyzer = CommandAnalyzer::new(&["/nonexistent/certitrust-detector".into()]).unwrap();
        assert!(matches!(
            analyzer.score(b"img").await,
            Err(CertiTrustError::AnalysisUnavailable(_))
        ));
    }
}
