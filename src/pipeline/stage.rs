// src/pipeline/stage.rs

use serde::{Deserialize, Serialize};

use crate::settings::model::{PipelineSpec, StageToggle};

/// One step of the build pipeline. Ordering is fixed by [`Stage::ORDER`]
/// (plus the trailing run stage) and is not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Format,
    Vet,
    Test,
    Generate,
    Install,
    Build,
    Run,
}

impl Stage {
    /// The short-lived stages, in execution order. `Run` is handled
    /// separately — it is the only stage whose process outlives the pipeline
    /// invocation.
    pub const ORDER: [Stage; 6] = [
        Stage::Format,
        Stage::Vet,
        Stage::Test,
        Stage::Generate,
        Stage::Install,
        Stage::Build,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Format => "format",
            Stage::Vet => "vet",
            Stage::Test => "test",
            Stage::Generate => "generate",
            Stage::Install => "install",
            Stage::Build => "build",
            Stage::Run => "run",
        }
    }

    /// Default `go` subcommand when no command override is configured.
    fn subcommand(self) -> &'static str {
        match self {
            Stage::Format => "fmt",
            Stage::Vet => "vet",
            Stage::Test => "test",
            Stage::Generate => "generate",
            Stage::Install => "install",
            Stage::Build => "build",
            Stage::Run => "run",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A stage resolved to a concrete invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePlan {
    pub stage: Stage,
    pub program: String,
    pub args: Vec<String>,
}

/// Resolve the enabled stages of a pipeline spec into invocations, in fixed
/// order. The `run` flag is not part of the plan.
pub fn plan(spec: &PipelineSpec) -> Vec<StagePlan> {
    Stage::ORDER
        .iter()
        .filter_map(|&stage| {
            let toggle = toggle_for(spec, stage);
            toggle.status.then(|| resolve(stage, toggle))
        })
        .collect()
}

fn toggle_for(spec: &PipelineSpec, stage: Stage) -> &StageToggle {
    match stage {
        Stage::Format => &spec.format,
        Stage::Vet => &spec.vet,
        Stage::Test => &spec.test,
        Stage::Generate => &spec.generate,
        Stage::Install => &spec.install,
        Stage::Build => &spec.build,
        Stage::Run => unreachable!("run has no toggle"),
    }
}

fn resolve(stage: Stage, toggle: &StageToggle) -> StagePlan {
    match &toggle.command {
        Some(command) => StagePlan {
            stage,
            program: command.clone(),
            args: toggle.args.clone(),
        },
        None => {
            let mut args = vec![stage.subcommand().to_string()];
            args.extend(toggle.args.iter().cloned());
            StagePlan {
                stage,
                program: "go".to_string(),
                args,
            }
        }
    }
}
