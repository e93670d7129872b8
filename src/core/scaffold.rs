//! Starter files written by `stackwright init`.

/// Reference stack: static site, a streaming-socket backend on port 3012,
/// and a host-header rule on a shared HTTPS listener.
pub const STACK_YAML: &str = r#"version: "1.0"
name: thrustin
description: "Managed by stackwright"

context:
  account: "123456789012"
  region: us-west-2

site:
  owner: maxrchung
  repository: THRUSTIN
  token_parameter: github-personal-access-token
  branch: master
  domain: maxrchung.com
  subdomain: thrustin
  build:
    app_root: frontend
    commands:
      - npm install
      - npm run build-prod
    artifact_dir: build
    artifact_files: ["**/*"]
    cache_paths: ["node_modules/**/*"]

compute:
  family: thrustin-task
  cpu: 256
  memory_mib: 512
  compatibility: fargate
  container:
    name: thrustin-container
    image: maxrchung/thrustin
    port: 3012
    upgrade_endpoint: true
    environment:
      NODE_ENV: { value: production }
      DATABASE_URL: { parameter: thrustin-db-connection }
  logs:
    group: thrustin-logs
    retention_days: 30

placement:
  network: maxrchung-vpc
  cluster: maxrchung-cluster
  service: thrustin-service
  desired_count: 1
  assign_public_ip: true
  cluster_security_groups: []

routing:
  target_group: thrustin-target-group
  protocol: http
  # The backend rejects plain HTTP probes with 400; both codes mean "up".
  health_check:
    healthy_codes: [200, 400]
    interval_seconds: 300
  listener:
    protocol: https
    tag:
      key: Name
      value: maxrchung-listener
  priority: 1
  host_header: thrustin.maxrchung.com
"#;

/// Existing shared infrastructure the reference stack binds to.
pub const INVENTORY_YAML: &str = r#"networks:
  - name: maxrchung-vpc
    id: vpc-0a1b2c3d

clusters:
  - name: maxrchung-cluster
    network: vpc-0a1b2c3d
    arn: arn:aws:ecs:us-west-2:123456789012:cluster/maxrchung-cluster

listeners:
  - arn: arn:aws:elasticloadbalancing:us-west-2:123456789012:listener/app/maxrchung-alb/50dc6c495c0c9188/f2f7dc8efc522ab2
    protocol: https
    tags:
      Name: maxrchung-listener
"#;
