//! 动作执行流程集成测试

use async_trait::async_trait;
use ops_actions::{
    config::ExecutionConfig,
    error::AppError,
    exec::{ExecutionResult, TIMEOUT_MARKER},
    models::{
        action::{ExecutionTarget, RunStatus},
        identity::{IdentityKind, IdentityRequest, SshProfileRequest},
        server::{HostSet, Server},
    },
    output::MAX_TEXT_CHARS,
    repository::{ActionRepository, IdentityRepository, ServerLookup},
    services::ActionService,
};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{
    action_service_with, count_runs, create_test_action, create_test_config, create_test_server,
    hosts_with_internal_primary, setup_test_db, ExecCall, RecordingExecutor,
};

#[tokio::test]
async fn test_dry_run_renders_without_spawning() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(&pool, "Ping", "ping {{host}}", ExecutionTarget::Local).await;

    let executor = Arc::new(RecordingExecutor::succeeding("should not run"));
    let service = action_service_with(&pool, executor.clone());

    let run = service.run(action.id, "Srv1", true).await.unwrap();

    assert_eq!(run.command_rendered, "ping 10.0.0.1");
    assert_eq!(run.status, RunStatus::DryRun);
    assert_eq!(run.exit_code, None);
    assert_eq!(run.duration_ms, 0);
    assert!(run.stdout.is_empty());
    assert!(run.stderr.is_empty());
    assert_eq!(run.server_name, "Srv1");
    assert!(executor.calls().is_empty());
    assert_eq!(count_runs(&pool).await, 1);
}

#[tokio::test]
async fn test_ssh_without_host_fails_before_history() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Empty", HostSet::default()).await;
    let action = create_test_action(&pool, "Uptime", "uptime", ExecutionTarget::Ssh).await;

    let executor = Arc::new(RecordingExecutor::succeeding(""));
    let service = action_service_with(&pool, executor.clone());

    let err = service.run(action.id, "Empty", false).await.unwrap_err();

    assert!(matches!(err, AppError::NoHostAvailable(_)));
    assert!(executor.calls().is_empty());
    assert_eq!(count_runs(&pool).await, 0);
}

#[tokio::test]
async fn test_ssh_dry_run_without_host_is_recorded() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Empty", HostSet::default()).await;
    let action =
        create_test_action(&pool, "Uptime", "uptime on [{{host}}]", ExecutionTarget::Ssh).await;

    let executor = Arc::new(RecordingExecutor::succeeding(""));
    let service = action_service_with(&pool, executor.clone());

    let run = service.run(action.id, "Empty", true).await.unwrap();

    assert_eq!(run.status, RunStatus::DryRun);
    assert_eq!(run.command_rendered, "uptime on []");
    assert_eq!(count_runs(&pool).await, 1);
}

#[tokio::test]
async fn test_unknown_action_or_server_writes_nothing() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(&pool, "Ping", "ping {{host}}", ExecutionTarget::Local).await;

    let executor = Arc::new(RecordingExecutor::succeeding(""));
    let service = action_service_with(&pool, executor.clone());

    let err = service.run(9999, "Srv1", false).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = service.run(action.id, "Nope", false).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(executor.calls().is_empty());
    assert_eq!(count_runs(&pool).await, 0);
}

#[tokio::test]
async fn test_local_dispatch_records_success() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(
        &pool,
        "Ping",
        "ping -c 1 {{host}} # {{server.name}}",
        ExecutionTarget::Local,
    )
    .await;

    let executor = Arc::new(RecordingExecutor::succeeding("1 packets transmitted\n"));
    let service = action_service_with(&pool, executor.clone());

    let run = service.run(action.id, "Srv1", false).await.unwrap();

    assert_eq!(
        executor.calls(),
        vec![ExecCall::Local {
            command: "ping -c 1 10.0.0.1 # Srv1".to_string()
        }]
    );
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.exit_code, Some(0));
    assert_eq!(run.duration_ms, 12);
    assert_eq!(run.stdout, "1 packets transmitted\n");
    assert!(run.finished_at >= run.started_at);

    let stored = service.get_run(run.id).await.unwrap();
    assert_eq!(stored, run);
}

#[tokio::test]
async fn test_execution_failure_is_recorded_not_raised() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(&pool, "Fail", "false", ExecutionTarget::Local).await;

    let executor = Arc::new(RecordingExecutor::new(ExecutionResult {
        exit_code: -1,
        stdout: "partial".to_string(),
        stderr: "\n[timeout]".to_string(),
        duration_ms: 10_000,
        timed_out: true,
    }));
    let service = action_service_with(&pool, executor);

    let run = service.run(action.id, "Srv1", false).await.unwrap();

    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(run.exit_code, Some(-1));
    assert_eq!(run.stderr, "\n[timeout]");
    assert_eq!(run.duration_ms, 10_000);
    assert_eq!(count_runs(&pool).await, 1);
}

#[tokio::test]
async fn test_ssh_dispatch_uses_profile_and_identity() {
    let pool = setup_test_db(&create_test_config()).await;
    let server = create_test_server(
        &pool,
        "Srv1",
        HostSet {
            internal_secondary: "10.0.0.2".to_string(),
            external_primary: "203.0.113.1".to_string(),
            ..Default::default()
        },
    )
    .await;

    let identities = IdentityRepository::new(pool.clone());
    let identity = identities
        .create(&IdentityRequest {
            name: "deploy".to_string(),
            username: Some("deploy".to_string()),
            kind: IdentityKind::SshKeyPath,
            key_path: Some("/keys/deploy".to_string()),
        })
        .await
        .unwrap();
    identities
        .set_ssh_profile(
            server.id,
            &SshProfileRequest {
                port: 2222,
                identity_id: Some(identity.id),
                username_override: None,
            },
        )
        .await
        .unwrap();

    let action = create_test_action(
        &pool,
        "Disk",
        "df -h && echo {{host}}:{{ssh.port}} {{hosts.external_primary}}",
        ExecutionTarget::Ssh,
    )
    .await;

    let executor = Arc::new(RecordingExecutor::succeeding("ok"));
    let service = action_service_with(&pool, executor.clone());

    let run = service.run(action.id, "Srv1", false).await.unwrap();

    let expected_command = "df -h && echo 10.0.0.2:2222 203.0.113.1";
    assert_eq!(run.command_rendered, expected_command);
    assert_eq!(
        executor.calls(),
        vec![ExecCall::Ssh {
            server: "Srv1".to_string(),
            port: Some(2222),
            identity: Some("deploy".to_string()),
            remote_command: expected_command.to_string(),
        }]
    );
}

#[tokio::test]
async fn test_unknown_placeholders_kept_verbatim() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(
        &pool,
        "Future",
        "deploy --to {{host}} --env {{deploy.env}}",
        ExecutionTarget::Local,
    )
    .await;

    let service = action_service_with(&pool, Arc::new(RecordingExecutor::succeeding("")));
    let run = service.run(action.id, "Srv1", true).await.unwrap();

    assert_eq!(run.command_rendered, "deploy --to 10.0.0.1 --env {{deploy.env}}");
}

#[tokio::test]
async fn test_large_output_truncated_in_record() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(&pool, "Dump", "cat big.log", ExecutionTarget::Local).await;

    let executor = Arc::new(RecordingExecutor::new(ExecutionResult {
        exit_code: 0,
        stdout: "o".repeat(60_000),
        stderr: "e".repeat(50_001),
        duration_ms: 5,
        timed_out: false,
    }));
    let service = action_service_with(&pool, executor);

    let run = service.run(action.id, "Srv1", false).await.unwrap();
    assert_eq!(run.stdout.chars().count(), MAX_TEXT_CHARS);
    assert_eq!(run.stderr.chars().count(), MAX_TEXT_CHARS);

    let stored = service.get_run(run.id).await.unwrap();
    assert_eq!(stored.stdout.chars().count(), MAX_TEXT_CHARS);
    assert_eq!(stored, run);
}

#[tokio::test]
async fn test_each_run_adds_exactly_one_row() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let ok = create_test_action(&pool, "Ok", "true", ExecutionTarget::Local).await;

    let service = action_service_with(&pool, Arc::new(RecordingExecutor::succeeding("")));

    for (i, dry_run) in [true, false, true, false].into_iter().enumerate() {
        service.run(ok.id, "Srv1", dry_run).await.unwrap();
        assert_eq!(count_runs(&pool).await, i as i64 + 1);
    }

    let history = service.list_runs_for_action(ok.id, 50).await.unwrap();
    assert_eq!(history.len(), 4);
    // 新的在前
    assert!(history.windows(2).all(|w| w[0].id > w[1].id));
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    create_test_server(&pool, "Srv2", hosts_with_internal_primary("10.0.0.2")).await;
    let action = create_test_action(&pool, "Ping", "ping {{host}}", ExecutionTarget::Local).await;

    let service = Arc::new(action_service_with(
        &pool,
        Arc::new(RecordingExecutor::succeeding("pong")),
    ));

    let action_id = action.id;
    let mut handles = Vec::new();
    for i in 0..10 {
        let service = service.clone();
        let server = if i % 2 == 0 { "Srv1" } else { "Srv2" };
        handles.push(tokio::spawn(async move {
            service.run(action_id, server, false).await
        }));
    }
    for handle in handles {
        let run = handle.await.unwrap().unwrap();
        assert_eq!(run.stdout, "pong");
    }

    assert_eq!(count_runs(&pool).await, 10);
    let runs = service.list_runs(100).await.unwrap();
    assert_eq!(runs.iter().filter(|r| r.server_name == "Srv1").count(), 5);
    assert!(runs.iter().all(|r| r.command_rendered.starts_with("ping 10.0.0.")));
}

#[tokio::test]
async fn test_ssh_preview() {
    let pool = setup_test_db(&create_test_config()).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    create_test_server(&pool, "Empty", HostSet::default()).await;

    let service = action_service_with(&pool, Arc::new(RecordingExecutor::succeeding("")));

    let preview = service.ssh_preview("Srv1", "uptime").await.unwrap();
    assert_eq!(
        preview,
        "ssh 10.0.0.1 -o BatchMode=yes -o ConnectTimeout=5 -o StrictHostKeyChecking=accept-new -- uptime"
    );

    let err = service.ssh_preview("Empty", "uptime").await.unwrap_err();
    assert!(matches!(err, AppError::NoHostAvailable(_)));
}

// ==================== 真实进程 ====================

#[cfg(unix)]
#[tokio::test]
async fn test_system_executor_runs_local_command() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(
        &pool,
        "Echo",
        "echo {{server.name}} {{host}}; echo warn >&2; exit 2",
        ExecutionTarget::Local,
    )
    .await;

    let service = ActionService::new(pool.clone(), &config.execution);
    let run = service.run(action.id, "Srv1", false).await.unwrap();

    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(run.exit_code, Some(2));
    assert_eq!(run.stdout, "Srv1 10.0.0.1\n");
    assert_eq!(run.stderr, "warn\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_system_executor_truncates_real_output() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(
        &pool,
        "Big",
        "head -c 60000 /dev/zero | tr '\\0' 'x'",
        ExecutionTarget::Local,
    )
    .await;

    let service = ActionService::new(pool.clone(), &config.execution);
    let run = service.run(action.id, "Srv1", false).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.stdout.chars().count(), MAX_TEXT_CHARS);
}

#[cfg(unix)]
#[tokio::test]
async fn test_real_timeout_is_recorded_as_error() {
    let mut config = create_test_config();
    config.execution = ExecutionConfig {
        local_timeout_secs: 1,
        ..config.execution
    };
    let pool = setup_test_db(&config).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(&pool, "Slow", "echo begin; sleep 5", ExecutionTarget::Local).await;

    let service = ActionService::new(pool.clone(), &config.execution);
    let run = service.run(action.id, "Srv1", false).await.unwrap();

    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(run.exit_code, Some(-1));
    assert_eq!(run.stdout, "begin\n");
    assert!(run.stderr.ends_with(TIMEOUT_MARKER));
    assert!(run.duration_ms >= 1_000);
    assert!(run.duration_ms < 5_000);
    assert_eq!(count_runs(&pool).await, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_abandoned_run_still_records_history() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(
        &pool,
        "Restart",
        "echo started; sleep 1; echo done",
        ExecutionTarget::Local,
    )
    .await;

    let service = ActionService::new(pool.clone(), &config.execution);

    // 调用方在进程结束前放弃等待，相当于 HTTP 客户端断开
    let abandoned =
        tokio::time::timeout(Duration::from_millis(300), service.run(action.id, "Srv1", false))
            .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(count_runs(&pool).await, 1);
    let runs = service.list_runs(10).await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Success);
    assert_eq!(runs[0].stdout, "started\ndone\n");
}

/// 返回未经清理的服务器数据，模拟外部来源的地址
struct RawServerLookup(Server);

#[async_trait]
impl ServerLookup for RawServerLookup {
    async fn lookup_server(&self, _name: &str) -> ops_actions::error::Result<Option<Server>> {
        Ok(Some(self.0.clone()))
    }
}

#[tokio::test]
async fn test_host_placeholder_matches_ssh_target() {
    let pool = setup_test_db(&create_test_config()).await;
    let stored = create_test_server(&pool, "Srv1", hosts_with_internal_primary("10.0.0.1")).await;
    let action = create_test_action(&pool, "Ping", "ping -c1 {{host}}", ExecutionTarget::Ssh).await;

    let padded = Server {
        hosts: HostSet {
            internal_primary: "  ".to_string(),
            external_primary: " 203.0.113.1\t".to_string(),
            ..Default::default()
        },
        ..stored
    };

    let executor = Arc::new(RecordingExecutor::succeeding(""));
    let service = ActionService::with_parts(
        ActionRepository::new(pool.clone()),
        Arc::new(RawServerLookup(padded.clone())),
        Arc::new(IdentityRepository::new(pool.clone())),
        executor.clone(),
        &create_test_config().execution,
    );

    let run = service.run(action.id, "Srv1", false).await.unwrap();
    assert_eq!(run.command_rendered, "ping -c1 203.0.113.1");

    let preview = service.ssh_preview("Srv1", "uptime").await.unwrap();
    assert!(preview.contains(" 203.0.113.1 "));
}
