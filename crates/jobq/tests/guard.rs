mod common;
use common::FakeInspector;

use jobq::jobs::SingleInstanceGuard;
use std::path::PathBuf;

fn guard_at(inspector: FakeInspector, own_pid: u32, cwd: &str) -> SingleInstanceGuard<FakeInspector> {
    SingleInstanceGuard::new(inspector, "jobq runner", own_pid, PathBuf::from(cwd))
}

#[test]
fn a_second_runner_in_the_same_directory_is_detected() {
    let inspector = FakeInspector::default();
    inspector.add_match(42, Some(PathBuf::from("/srv/app")));

    let guard = guard_at(inspector, 1, "/srv/app");
    assert_eq!(guard.already_running(), Some(42));
}

#[test]
fn the_calling_process_never_blocks_itself() {
    let inspector = FakeInspector::default();
    inspector.add_match(1, Some(PathBuf::from("/srv/app")));

    let guard = guard_at(inspector, 1, "/srv/app");
    assert_eq!(guard.already_running(), None);
}

#[test]
fn runners_for_other_deployments_do_not_count() {
    let inspector = FakeInspector::default();
    inspector.add_match(42, Some(PathBuf::from("/srv/other-app")));

    let guard = guard_at(inspector, 1, "/srv/app");
    assert_eq!(guard.already_running(), None);
}

#[test]
fn candidates_without_a_resolvable_cwd_are_skipped() {
    let inspector = FakeInspector::default();
    inspector.add_match(42, None);
    inspector.add_match(43, Some(PathBuf::from("/srv/app")));

    let guard = guard_at(inspector, 1, "/srv/app");
    assert_eq!(guard.already_running(), Some(43));
}

#[test]
fn no_matching_processes_means_no_runner() {
    let guard = guard_at(FakeInspector::default(), 1, "/srv/app");
    assert_eq!(guard.already_running(), None);
}
