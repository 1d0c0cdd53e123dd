// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 外部进程调用 (ffmpeg / ffprobe / yolo)
///
/// 所有外部工具都以子进程方式同步调用, 非零退出码视为致命错误。
use std::process::{Command, Stdio};

use tracing::debug;

/// 外部进程错误
#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    #[error("无法启动 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} 退出码非零 ({code:?}): {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{program} 输出无法解析: {message}")]
    BadOutput { program: String, message: String },
}

/// 命令行的可读形式 (日志用)
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// 运行命令直到结束, stdout/stderr 继承当前终端
pub fn run_checked(cmd: &mut Command) -> Result<(), ExternalError> {
    debug!("▶️ {}", describe(cmd));
    let program = program_name(cmd);
    let status = cmd.status().map_err(|source| ExternalError::Spawn {
        program: program.clone(),
        source,
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(ExternalError::NonZeroExit {
            program,
            code: status.code(),
            stderr: String::new(),
        })
    }
}

/// 运行命令并返回 stdout 文本
pub fn capture_stdout(cmd: &mut Command) -> Result<String, ExternalError> {
    debug!("▶️ {}", describe(cmd));
    let program = program_name(cmd);
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ExternalError::Spawn {
            program: program.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(ExternalError::NonZeroExit {
            program,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// 检查外部工具是否可用 (`<program> -version` 成功即可)
pub fn is_available(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
