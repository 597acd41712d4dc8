//! TLS app assembly
//!
//! [`TlsAppBuilder`] walks every server block, derives an automation policy
//! for it, and turns the collected policies and certificate loaders into a
//! [`TlsApp`].
//!
//! # Catch-all policy
//!
//! A block without hostnames matches every host, so its policy has no
//! subjects and acts as the catch-all. All such blocks share one policy,
//! held in the arena and referred to by a [`PolicyId`]. The catch-all built
//! from global options is only emitted once a block adopts it.

use autotls_common::{PolicyId, Warning, Warnings};
use std::collections::HashSet;
use tracing::{debug, trace};

use crate::block::{ServerBlock, ServerBlockPairing, BIND_DIRECTIVE, ON_DEMAND_DIRECTIVE};
use crate::consolidate::consolidate_automation_policies;
use crate::error::{Ambiguity, TlsPolicyError, TlsPolicyResult};
use crate::issuer::{AcmeIssuer, ChallengesConfig, InternalIssuer, Issuer};
use crate::loader::{merge_certificate_loaders, CertificateLoader};
use crate::options::GlobalOptions;
use crate::policy::{base_automation_policy, AutomationConfig, AutomationPolicy, TlsApp};
use crate::registry::ModuleRegistry;
use crate::subject::{qualifies_for_cert, qualifies_for_public_cert, wants_internal_issuer};

/// Result of a successful build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    pub tls: TlsApp,
    /// Non-fatal problems noticed along the way
    pub warnings: Vec<Warning>,
}

/// Builds the TLS app for a set of server block pairings
pub struct TlsAppBuilder<'a> {
    options: &'a GlobalOptions,
    registry: &'a dyn ModuleRegistry,
}

/// Mutable state of one build
#[derive(Default)]
struct BuildState {
    /// Every policy created so far
    arena: Vec<AutomationPolicy>,
    /// Policies to emit, in the order they were appended
    order: Vec<PolicyId>,
    catch_all: Option<PolicyId>,
    loaders: Vec<CertificateLoader>,
    warnings: Warnings,
}

impl BuildState {
    fn alloc(&mut self, policy: AutomationPolicy) -> PolicyId {
        let id = PolicyId::new(self.arena.len());
        self.arena.push(policy);
        id
    }

    fn append(&mut self, id: PolicyId) {
        if !self.order.contains(&id) {
            self.order.push(id);
        }
    }

    /// Move the appended policies out of the arena, in append order
    fn into_policies(self) -> (Vec<AutomationPolicy>, Warnings) {
        let mut slots: Vec<Option<AutomationPolicy>> = self.arena.into_iter().map(Some).collect();
        let policies = self
            .order
            .iter()
            .filter_map(|id| slots.get_mut(id.index()).and_then(Option::take))
            .collect();
        (policies, self.warnings)
    }
}

impl<'a> TlsAppBuilder<'a> {
    pub fn new(options: &'a GlobalOptions, registry: &'a dyn ModuleRegistry) -> Self {
        Self { options, registry }
    }

    /// Compile the pairings into a TLS app
    ///
    /// Blocks are processed in pairing order, then in block order within a
    /// pairing. The first error aborts the build.
    pub fn build(&self, pairings: &[ServerBlockPairing]) -> TlsPolicyResult<BuildOutput> {
        let blocks: Vec<&ServerBlock> = pairings
            .iter()
            .flat_map(|pairing| &pairing.server_blocks)
            .collect();
        let https_port = self.options.https_port;
        let tls_hostless_blocks = blocks
            .iter()
            .filter(|block| block.has_tls_hostless_key(https_port))
            .count();

        debug!(
            pairings = pairings.len(),
            blocks = blocks.len(),
            tls_hostless_blocks,
            "Building TLS app"
        );

        let mut state = BuildState::default();
        if let Some(global) =
            base_automation_policy(self.options, self.registry, &mut state.warnings, false)?
        {
            let id = state.alloc(global);
            state.catch_all = Some(id);
        }

        for block in &blocks {
            self.add_block(&mut state, block, tls_hostless_blocks)?;
        }

        rescue_hostless_hosts(&mut state, &blocks);
        self.finish(state)
    }

    fn add_block(
        &self,
        state: &mut BuildState,
        block: &ServerBlock,
        tls_hostless_blocks: usize,
    ) -> TlsPolicyResult<()> {
        let fresh = base_automation_policy(self.options, self.registry, &mut state.warnings, true)?
            .unwrap_or_default();

        let hostnames = block.hostnames();
        let id = match state.catch_all {
            Some(catch_all) if hostnames.is_empty() => {
                trace!(policy = %catch_all, "Block without hostnames adopts the catch-all policy");
                catch_all
            }
            _ => state.alloc(fresh),
        };
        let adopted_catch_all = state.catch_all == Some(id);
        let policy = &mut state.arena[id.index()];

        if block.pile.contains(ON_DEMAND_DIRECTIVE) {
            policy.on_demand = true;
        }

        let issuers = block.pile.issuers()?;
        for issuer in &issuers {
            if adopted_catch_all && policy.issuer.as_ref() != Some(*issuer) {
                return Err(Ambiguity::CatchAllIssuerConflict {
                    existing: policy
                        .issuer
                        .as_ref()
                        .map_or_else(|| "none".to_string(), ToString::to_string),
                    requested: issuer.to_string(),
                }
                .into());
            }
            policy.issuer = Some((*issuer).clone());
        }

        for hosts in block.pile.bind_hosts()? {
            apply_bind_hosts(policy, hosts, &mut state.warnings);
        }

        if hostnames.is_empty() {
            if tls_hostless_blocks > 1 {
                return Err(Ambiguity::MultipleHostlessBlocks.into());
            }
            if state.catch_all.is_none() {
                trace!(policy = %id, "Block without hostnames becomes the catch-all policy");
                state.catch_all = Some(id);
            }
        }

        let mut subjects = hostnames;
        subjects.sort();
        policy.subjects = subjects;

        let explicit_issuer = !issuers.is_empty() || self.options.chooses_issuer();
        let internal = if explicit_issuer {
            None
        } else {
            split_internal_subjects(policy)?
        };

        trace!(
            policy = %id,
            subjects = ?policy.subjects,
            on_demand = policy.on_demand,
            issuer = ?policy.issuer.as_ref().map(Issuer::module_name),
            "Derived automation policy for server block"
        );

        state.append(id);
        if let Some(internal) = internal {
            let internal_id = state.alloc(internal);
            state.append(internal_id);
        }

        state
            .loaders
            .extend(block.pile.cert_loaders()?.into_iter().cloned());

        Ok(())
    }

    fn finish(&self, mut state: BuildState) -> TlsPolicyResult<BuildOutput> {
        let mut tls = TlsApp::default();

        let loaders = std::mem::take(&mut state.loaders);
        for (kind, loader) in merge_certificate_loaders(loaders, &mut state.warnings) {
            let encoded = loader.encode(&mut state.warnings);
            tls.certificates.insert(kind.to_string(), encoded);
        }

        let (mut policies, mut warnings) = state.into_policies();
        for policy in &mut policies {
            policy.encode_issuer(&mut warnings);
        }
        let policies = consolidate_automation_policies(policies);
        ensure_unique_subjects(&policies)?;

        let automation = AutomationConfig {
            policies,
            on_demand: self.options.on_demand_tls.clone(),
        };
        if !automation.is_empty() {
            tls.automation = Some(automation);
        }

        debug!(
            policies = tls.policies().len(),
            loaders = tls.certificates.len(),
            warnings = warnings.len(),
            "Built TLS app"
        );

        Ok(BuildOutput {
            tls,
            warnings: warnings.into_vec(),
        })
    }
}

/// Point the ACME challenge listeners at the first bind host
///
/// A policy without an issuer gets a default ACME issuer. Issuers that are
/// not ACME-based have no challenges and are left alone. An already
/// configured bind host is kept.
fn apply_bind_hosts(policy: &mut AutomationPolicy, hosts: &[String], warnings: &mut Warnings) {
    let issuer = policy
        .issuer
        .get_or_insert_with(|| Issuer::Acme(AcmeIssuer::default()));
    let Some(acme) = issuer.acme_issuer_mut() else {
        trace!("Issuer is not ACME-based, ignoring bind hosts");
        return;
    };

    let challenges = acme.challenges.get_or_insert_with(ChallengesConfig::default);
    if challenges.bind_host.is_some() {
        return;
    }
    if let [first, _, ..] = hosts {
        warnings.push(Warning::for_directive(
            BIND_DIRECTIVE,
            format!(
                "ACME challenges can bind to only one host; using '{}' of {} hosts",
                first,
                hosts.len()
            ),
        ));
    }
    challenges.bind_host = hosts.first().cloned();
}

/// Move subjects needing the internal issuer into a policy of their own
///
/// Only a policy mixing public and internal subjects is split; the public
/// part keeps the policy, falling back to the default ACME issuer.
fn split_internal_subjects(
    policy: &mut AutomationPolicy,
) -> TlsPolicyResult<Option<AutomationPolicy>> {
    if let Some(rejected) = policy.subjects.iter().find(|s| !qualifies_for_cert(s)) {
        return Err(TlsPolicyError::SubjectRejected {
            subject: rejected.clone(),
        });
    }

    let on_demand = policy.on_demand;
    let (internal, external): (Vec<String>, Vec<String>) = policy
        .subjects
        .iter()
        .cloned()
        .partition(|subject| wants_internal_issuer(subject, on_demand));
    if internal.is_empty() || external.is_empty() {
        return Ok(None);
    }

    trace!(?internal, ?external, "Splitting internal subjects into their own policy");

    policy.subjects = external;
    if policy.issuer.is_none() {
        policy.issuer = Some(Issuer::Acme(AcmeIssuer::default()));
    }
    Ok(Some(AutomationPolicy {
        subjects: internal,
        issuer: Some(Issuer::Internal(InternalIssuer::default())),
        ..policy.clone()
    }))
}

/// Keep hosts that share a block with a hostless key under management
///
/// Such hosts never show up in route matchers, so they are listed in the
/// `automate` loader. The ones a public CA would refuse also get a policy
/// with the internal issuer.
fn rescue_hostless_hosts(state: &mut BuildState, blocks: &[&ServerBlock]) {
    let mut hosts: Vec<String> = blocks
        .iter()
        .flat_map(|block| block.hosts_shared_with_hostless_key())
        .map(str::to_string)
        .collect();
    hosts.sort();
    hosts.dedup();
    if hosts.is_empty() {
        return;
    }

    let internal: Vec<String> = hosts
        .iter()
        .filter(|host| !qualifies_for_public_cert(host))
        .cloned()
        .collect();

    trace!(hosts = ?hosts, internal = ?internal, "Rescued hosts sharing a block with a hostless key");

    state.loaders.push(CertificateLoader::Automate(hosts));
    if !internal.is_empty() {
        let id = state.alloc(AutomationPolicy::internal(internal));
        state.append(id);
    }
}

fn ensure_unique_subjects(policies: &[AutomationPolicy]) -> TlsPolicyResult<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for subject in policies.iter().flat_map(|policy| &policy.subjects) {
        if !seen.insert(subject) {
            return Err(Ambiguity::SubjectInMultiplePolicies {
                subject: subject.clone(),
            }
            .into());
        }
    }
    Ok(())
}
