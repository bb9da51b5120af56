//! The unmount command: discover, confirm, scale down, wait

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use unmount_lib::{
    discover, is_unmounted, spawn_wait, ClaimSet, ClusterApi, Finder, Scaler, VolumeFilter,
    WaitOptions, WaitOutcome,
};

use crate::output::{
    print_info, print_prompt, print_report, print_success, print_wait_error, print_warning,
    spin_until, write_controllers,
};

/// Resolved arguments for one unmount run
#[derive(Debug, Clone)]
pub struct UnmountArgs {
    pub filter: VolumeFilter,
    pub dry_run: bool,
    /// Skip the confirmation prompt
    pub assume_yes: bool,
    pub wait: WaitOptions,
}

/// Run the full unmount flow
///
/// Controllers are written to `out`; the confirmation answer is read from
/// `input`. Every controller is attempted before batch failures are reported.
pub async fn run(
    cluster: Arc<dyn ClusterApi>,
    args: &UnmountArgs,
    out: &mut dyn Write,
    input: &mut dyn BufRead,
) -> Result<()> {
    args.filter.validate()?;

    let finder = Finder::new(cluster.clone());
    let plan = discover(&finder, &args.filter).await?;
    if plan.is_empty() {
        return Ok(());
    }

    write_controllers(out, &plan.controllers).context("Failed to write controller list")?;

    let confirmed = args.dry_run
        || args.assume_yes
        || confirm("Scale down the controllers listed above?", input)?;
    if !confirmed {
        print_info("Operation cancelled by user");
        return Ok(());
    }

    if args.dry_run {
        print_warning("Dry-run mode - no changes applied");
    }
    print_info(&format!(
        "Scaling down {} controller(s)...",
        plan.controllers.len()
    ));
    let report = Scaler::new(cluster, args.dry_run)
        .scale_down_all(&plan.controllers)
        .await;
    print_report(&report);

    let failures = report.failure_count();
    if failures > 0 {
        bail!("encountered {} error(s) scaling down", failures);
    }

    if !args.dry_run {
        wait_for_pods(finder, plan.claims, args.wait).await?;
    }

    print_success("Scale down complete");
    Ok(())
}

/// Ask the user to type `yes`
pub fn confirm(prompt: &str, input: &mut dyn BufRead) -> Result<bool> {
    print_prompt(&format!("{}\nType 'yes' to continue: ", prompt));

    let mut response = String::new();
    input
        .read_line(&mut response)
        .context("Failed to read user input")?;

    Ok(response.trim().eq_ignore_ascii_case("yes"))
}

async fn wait_for_pods(finder: Finder, claims: ClaimSet, options: WaitOptions) -> Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let handle = spawn_wait(
        move || {
            let (finder, claims) = (finder.clone(), claims.clone());
            async move { is_unmounted(&finder, &claims).await }
        },
        |e| print_wait_error(&e.to_string()),
        options,
        cancel.clone(),
    );

    let outcome = spin_until("Waiting for pods to scale down... ", handle).await;
    cancel.cancel();

    match outcome {
        WaitOutcome::Converged { .. } => Ok(()),
        WaitOutcome::TimedOut { attempts } => bail!(
            "timed out waiting for pods to scale down after {} check(s)",
            attempts
        ),
        WaitOutcome::Cancelled { .. } => bail!("cancelled while waiting for pods to scale down"),
    }
}
