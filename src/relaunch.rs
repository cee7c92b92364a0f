use std::io::Write;

use crate::docker::ContainerRuntime;
use crate::error::Result;
use crate::plan::LaunchPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    DryRun,
    Execute,
}

/// The three commands a relaunch performs, as printed by `--dry-run`.
pub fn describe(plan: &LaunchPlan) -> [String; 3] {
    let bin = plan.runtime.as_str();
    [
        format!("Pull image: {bin} pull {}", plan.image),
        format!("Stop container: {bin} stop {}", plan.name),
        format!("Run container: {}", plan.run_command_line()),
    ]
}

/// Pull, stop the previous instance, then run `plan`.
///
/// In [`Mode::DryRun`] the runtime is never touched and only the three
/// command lines are written to `out`.
pub async fn relaunch<W: Write>(
    runtime: &dyn ContainerRuntime,
    plan: &LaunchPlan,
    mode: Mode,
    out: &mut W,
) -> Result<()> {
    if mode == Mode::DryRun {
        for line in describe(plan) {
            writeln!(out, "{line}")?;
        }
        return Ok(());
    }

    runtime.pull(&plan.image).await?;
    runtime.stop_and_remove(&plan.name).await?;
    let output = runtime.run(plan).await?;

    writeln!(out, "Command executed successfully. Output:\n{output}")?;
    Ok(())
}
