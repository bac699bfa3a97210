use trellis_lib::Address;
use trellis_lib::backend::docker::dependencies::InjectDockerDependencies;
use trellis_lib::backend::docker::parser::DockerfileParseRequest;
use trellis_lib::inject::inject_dependencies;
use trellis_lib::target::rules::WrappedTargetRequest;

use super::common::TestRepo;

fn specs(addresses: &[Address]) -> Vec<String> {
  addresses.iter().map(Address::spec).collect()
}

fn binaries(repo: &TestRepo) {
  repo
    .write(
      "src/app/BUILD",
      "pex_binary(name=\"bin\", entry_point=\"main.py\")\n\npython_library(name=\"lib\")\n",
    )
    .write("src/tool/BUILD", "pex_binary(entry_point=\"tool.py\")\n");
}

#[tokio::test]
async fn dockerfile_copies_become_dependencies() {
  let repo = TestRepo::new();
  binaries(&repo);
  repo.write("docker/BUILD", "docker_image(dependencies=[\"src/app:lib\"])\n").write(
    "docker/Dockerfile",
    "FROM python:3.9\nCOPY src.tool/tool.pex /bin/\nCOPY src.app/bin.pex \\\n  src.app/lib.pex \\\n  missing/nope.pex /app/\n",
  );

  let deps = repo.project().dependencies("docker").await.unwrap();
  assert_eq!(specs(&deps), vec!["src/app:bin", "src/app:lib", "src/tool:tool"]);
}

#[tokio::test]
async fn non_runnable_and_unknown_references_are_dropped() {
  let repo = TestRepo::new();
  binaries(&repo);
  repo
    .write("docker/BUILD", "docker_image()\n")
    .write("docker/Dockerfile", "COPY src.app/lib.pex other/thing.pex /app/\n");

  let deps = repo.project().dependencies("docker:docker").await.unwrap();
  assert!(deps.is_empty());
}

#[tokio::test]
async fn image_without_references_injects_nothing() {
  let repo = TestRepo::new();
  binaries(&repo);
  repo
    .write("docker/BUILD", "docker_image()\n")
    .write("docker/Dockerfile", "FROM scratch\nCOPY config.yaml /etc/\n");

  let project = repo.project();
  let session = project.session();
  let image = session.execute(WrappedTargetRequest(Address::new("docker", "docker"))).await.unwrap();
  let injected = inject_dependencies(&session.context(), image.dependencies().unwrap())
    .await
    .unwrap();
  assert!(injected.is_empty());
}

#[tokio::test]
async fn image_without_sources_injects_nothing() {
  let repo = TestRepo::new();
  binaries(&repo);
  repo.write("docker/BUILD", "docker_image(sources=[])\n");

  let project = repo.project();
  let session = project.session();
  let image = session.execute(WrappedTargetRequest(Address::new("docker", "docker"))).await.unwrap();
  let injected = session
    .execute(InjectDockerDependencies(image.dependencies().unwrap()))
    .await
    .unwrap();
  assert!(injected.is_empty());
}

#[tokio::test]
async fn dockerfile_is_parsed_once_per_session() {
  let repo = TestRepo::new();
  binaries(&repo);
  repo
    .write("docker/BUILD", "docker_image()\n")
    .write("docker/Dockerfile", "COPY src.app/bin.pex /app/\n");

  let project = repo.project();
  let session = project.session();
  let image = session.execute(WrappedTargetRequest(Address::new("docker", "docker"))).await.unwrap();
  let sources = image.sources().unwrap();

  let first = session.execute(DockerfileParseRequest(sources.clone())).await.unwrap();
  let before = session.stats();
  let second = session.execute(DockerfileParseRequest(sources)).await.unwrap();
  assert_eq!(first, second);
  assert_eq!(first.source, "docker/Dockerfile");
  assert_eq!(session.stats().rules_executed, before.rules_executed);
  assert_eq!(session.stats().cache_hits, before.cache_hits + 1);
}

#[tokio::test]
async fn other_targets_only_get_explicit_dependencies() {
  let repo = TestRepo::new();
  binaries(&repo);
  repo.write(
    "src/svc/BUILD",
    "python_library(dependencies=[\"src/app:lib\", \":helpers\"])\n\npython_library(name=\"helpers\", sources=[])\n",
  );

  let deps = repo.project().dependencies("src/svc").await.unwrap();
  assert_eq!(specs(&deps), vec!["src/app:lib", "src/svc:helpers"]);
}

#[tokio::test]
async fn unknown_explicit_dependency_fails() {
  let repo = TestRepo::new();
  repo.write("src/BUILD", "python_library(dependencies=[\":missing\"])\n");

  assert!(repo.project().dependencies("src").await.is_err());
}
