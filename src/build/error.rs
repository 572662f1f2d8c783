use std::path::PathBuf;

/// Failures of the `build` verb. Each maps to a distinct process exit code.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Preprocessor error; build stopped.")]
    Preprocess(#[source] anyhow::Error),

    #[error("Build error: gradlew {task} failed")]
    Gradle {
        task: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Validation failed:\n{0}")]
    Validation(String),

    #[error("Validation error.")]
    ValidatorFailed(#[source] anyhow::Error),

    #[error("No devices connected!")]
    NoDevice,

    #[error("No compatible Wear OS devices found.")]
    NoWearOsDevice,

    #[error("Installation failed.")]
    Install(#[source] anyhow::Error),

    #[error("Download of {tool} failed.")]
    Download {
        tool: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Environment variables JAVA_HOME or ANDROID_HOME are not set ({0} is missing).")]
    MissingEnv(&'static str),

    #[error("Can't find {}.", .0.display())]
    GradleScriptMissing(PathBuf),

    #[error("Can't determine watch face id: check {}", .0.display())]
    WatchFaceId(PathBuf),
}

impl BuildError {
    pub fn exit_code(&self) -> u8 {
        match self {
            BuildError::Preprocess(_) => 1,
            BuildError::Gradle { .. } => 2,
            BuildError::Validation(_) | BuildError::ValidatorFailed(_) => 3,
            BuildError::NoDevice | BuildError::NoWearOsDevice | BuildError::Install(_) => 5,
            BuildError::Download { .. } => 6,
            BuildError::MissingEnv(_) => 7,
            BuildError::GradleScriptMissing(_) | BuildError::WatchFaceId(_) => 9,
        }
    }
}
