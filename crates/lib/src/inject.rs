//! Dependency injection.
//!
//! Backends may add dependencies that a BUILD file does not spell out. Each
//! injector is a member of the [`InjectDependenciesRequest`] union and runs
//! only for dependencies fields of the kind it declares in
//! [`InjectDependencies::INJECT_FOR`].

use futures::future::try_join;
use serde::Serialize;
use tracing::debug;

use crate::address::Address;
use crate::engine::{Context, EngineError, Request, RuleRegistry, Union, UnionMember};
use crate::target::rules::{DependenciesRequest, UnparsedAddressInputs};
use crate::target::{Addresses, DependenciesField};

/// Union category for dependency injectors.
pub struct InjectDependenciesRequest;

impl Union for InjectDependenciesRequest {
  type Input = DependenciesField;
  type Output = InjectedDependencies;
}

/// Addresses added by one injector, sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct InjectedDependencies(Vec<Address>);

impl InjectedDependencies {
  pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
    let mut addresses: Vec<_> = addresses.into_iter().collect();
    addresses.sort();
    addresses.dedup();
    Self(addresses)
  }

  pub fn addresses(&self) -> &[Address] {
    &self.0
  }

  pub fn into_addresses(self) -> Vec<Address> {
    self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// An injector request type. Implementing this makes the type a member of
/// [`InjectDependenciesRequest`] that only applies to fields of kind
/// [`INJECT_FOR`](Self::INJECT_FOR).
pub trait InjectDependencies: Request<Output = InjectedDependencies> {
  const INJECT_FOR: &'static str;

  fn new(field: DependenciesField) -> Self;
}

impl<T: InjectDependencies> UnionMember<InjectDependenciesRequest> for T {
  fn from_input(input: DependenciesField) -> Self {
    T::new(input)
  }

  fn applies_to(input: &DependenciesField) -> bool {
    input.kind == T::INJECT_FOR
  }
}

/// Run every injector applicable to `field` and merge their results.
pub async fn inject_dependencies(ctx: &Context, field: DependenciesField) -> Result<InjectedDependencies, EngineError> {
  let injected = ctx.get_union::<InjectDependenciesRequest>(field).await?;
  Ok(InjectedDependencies::new(
    injected.into_iter().flat_map(InjectedDependencies::into_addresses),
  ))
}

pub fn register(registry: &mut RuleRegistry) {
  registry.rule(resolve_dependencies);
}

async fn resolve_dependencies(ctx: Context, DependenciesRequest(field): DependenciesRequest) -> Result<Addresses, EngineError> {
  let explicit = UnparsedAddressInputs {
    specs: field.specs.clone(),
    relative_to: field.address.path.clone(),
  };
  let address = field.address.clone();
  let (explicit, injected) = try_join(ctx.get(explicit), inject_dependencies(&ctx, field)).await?;

  let resolved = Addresses::new(explicit.addresses().into_iter().chain(injected.into_addresses()));
  debug!(address = %address, dependencies = resolved.0.len(), "resolved dependencies");
  Ok(resolved)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone, PartialEq, Eq, Hash)]
  struct InjectSiblings(DependenciesField);

  impl Request for InjectSiblings {
    type Output = InjectedDependencies;
  }

  impl InjectDependencies for InjectSiblings {
    const INJECT_FOR: &'static str = "sibling_dependencies";

    fn new(field: DependenciesField) -> Self {
      Self(field)
    }
  }

  fn field(kind: &str) -> DependenciesField {
    DependenciesField {
      address: Address::new("src", "app"),
      kind: kind.to_string(),
      specs: vec![],
    }
  }

  #[tokio::test]
  async fn injectors_only_run_for_their_kind() {
    let mut registry = RuleRegistry::new();
    registry
      .rule(|_, InjectSiblings(field): InjectSiblings| async move {
        Ok(InjectedDependencies::new([
          Address::new(&field.address.path, "z"),
          Address::new(&field.address.path, "a"),
          Address::new(&field.address.path, "z"),
        ]))
      })
      .union_member::<InjectDependenciesRequest, InjectSiblings>();
    let session = registry.build().unwrap().session();
    let ctx = session.context();

    let injected = inject_dependencies(&ctx, field("sibling_dependencies")).await.unwrap();
    assert_eq!(injected.addresses(), &[Address::new("src", "a"), Address::new("src", "z")]);

    let skipped = inject_dependencies(&ctx, field("other_dependencies")).await.unwrap();
    assert!(skipped.is_empty());
    assert_eq!(session.stats().rules_executed, 1);
  }
}
