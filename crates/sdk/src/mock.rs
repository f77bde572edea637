//! In-memory deployments for testing migrations without live services.
//!
//! [`MockControlPlane`] models a single control-plane deployment: organizations,
//! spaces, users, memberships and role grants, with the same preconditions the
//! real API enforces (role grants require organization membership, user ids
//! are unique). [`MockIdentityDirectory`] models the paired identity directory.
//!
//! # Features
//!
//! - **Coherent state**: user summaries are computed from memberships and grants
//! - **Failure injection**: fail the next N calls of an operation, or fail one user persistently
//! - **Request counting**: per-operation call counters for verification
//! - **Inspection**: query the resulting grants after an import
//!
//! # Example
//!
//! ```no_run
//! use user_migration_sdk::mock::MockControlPlane;
//! use user_migration_types::OrgRoleKind;
//!
//! let deployment = MockControlPlane::new("https://api.sys.source.example.com");
//! let acme = deployment.add_organization("acme");
//! let sandbox = deployment.add_space(&acme, "sandbox");
//! let alice = deployment.add_user("alice");
//! deployment.assign_org_role(&acme, &alice, OrgRoleKind::Auditor);
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use parking_lot::RwLock;

use user_migration_types::{
    EmailRecord, ExternalIdentity, NewIdentity, OrgEntity, OrgGuid, OrgResource, OrgRoleKind, Page,
    Resource, ResourceMetadata, SpaceEntity, SpaceGuid, SpaceResource, SpaceRoleKind, UserEntity,
    UserGuid, UserResource, UserSummary, UserSummaryResource,
};

use crate::{
    control_plane::ControlPlane,
    error::{Result, SdkError},
    identity::IdentityDirectory,
};

/// Default number of users per listing page.
const DEFAULT_PAGE_SIZE: usize = 100;

/// Prefix of the opaque `next_url` handed out by the user listing.
const USERS_PAGE_PREFIX: &str = "/v2/users?results-per-page=";

/// Operations whose calls are counted and can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// [`ControlPlane::list_users`].
    ListUsers,
    /// [`ControlPlane::user_summary`].
    UserSummary,
    /// [`ControlPlane::find_organizations`].
    FindOrganizations,
    /// [`ControlPlane::find_spaces`].
    FindSpaces,
    /// [`ControlPlane::create_user`].
    CreateUser,
    /// [`ControlPlane::associate_user_with_organization`].
    AssociateUser,
    /// [`ControlPlane::grant_organization_role`].
    GrantOrganizationRole,
    /// [`ControlPlane::grant_space_role`].
    GrantSpaceRole,
    /// [`IdentityDirectory::list_identities`].
    ListIdentities,
    /// [`IdentityDirectory::create_identity`].
    CreateIdentity,
}

/// Per-operation call counters and pending injected failures.
#[derive(Debug, Default)]
struct Injection {
    calls: RwLock<HashMap<MockOperation, usize>>,
    pending_failures: RwLock<HashMap<MockOperation, usize>>,
}

impl Injection {
    /// Counts a call and consumes one pending failure, if any.
    fn check(&self, op: MockOperation) -> Result<()> {
        *self.calls.write().entry(op).or_default() += 1;

        let mut pending = self.pending_failures.write();
        match pending.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(SdkError::api(503, None, format!("injected failure for {op:?}")))
            },
            _ => Ok(()),
        }
    }

    fn inject(&self, op: MockOperation, count: usize) {
        self.pending_failures.write().insert(op, count);
    }

    fn count(&self, op: MockOperation) -> usize {
        self.calls.read().get(&op).copied().unwrap_or(0)
    }

    fn clear(&self) {
        self.calls.write().clear();
        self.pending_failures.write().clear();
    }
}

// ============================================================================
// Control plane
// ============================================================================

#[derive(Debug, Clone)]
struct OrgRecord {
    guid: OrgGuid,
    name: String,
}

#[derive(Debug, Clone)]
struct SpaceRecord {
    guid: SpaceGuid,
    name: String,
    organization: OrgGuid,
}

#[derive(Debug, Clone)]
struct UserRecord {
    guid: UserGuid,
    username: Option<String>,
}

/// Deployment state. Vectors keep insertion order, which listings preserve.
#[derive(Debug, Default)]
struct DeploymentState {
    organizations: Vec<OrgRecord>,
    spaces: Vec<SpaceRecord>,
    users: Vec<UserRecord>,
    org_members: HashSet<(OrgGuid, UserGuid)>,
    org_roles: HashSet<(OrgGuid, UserGuid, OrgRoleKind)>,
    space_roles: HashSet<(SpaceGuid, UserGuid, SpaceRoleKind)>,
    summary_overrides: HashMap<UserGuid, UserSummary>,
    failing_summaries: HashSet<UserGuid>,
}

impl DeploymentState {
    fn organization(&self, guid: &OrgGuid) -> Option<&OrgRecord> {
        self.organizations.iter().find(|org| &org.guid == guid)
    }

    fn space(&self, guid: &SpaceGuid) -> Option<&SpaceRecord> {
        self.spaces.iter().find(|space| &space.guid == guid)
    }

    fn has_user(&self, guid: &UserGuid) -> bool {
        self.users.iter().any(|user| &user.guid == guid)
    }

    fn space_resource(space: &SpaceRecord) -> SpaceResource {
        Resource {
            metadata: metadata(space.guid.as_str(), "spaces"),
            entity: SpaceEntity { name: space.name.clone() },
        }
    }

    /// Organization resource with every space of the organization embedded.
    fn org_resource(&self, org: &OrgRecord, embed_spaces: bool) -> OrgResource {
        let spaces = if embed_spaces {
            self.spaces
                .iter()
                .filter(|space| space.organization == org.guid)
                .map(Self::space_resource)
                .collect()
        } else {
            Vec::new()
        };
        Resource {
            metadata: metadata(org.guid.as_str(), "organizations"),
            entity: OrgEntity { name: org.name.clone(), spaces },
        }
    }

    fn orgs_where(&self, pred: impl Fn(&OrgGuid) -> bool) -> Vec<OrgResource> {
        self.organizations
            .iter()
            .filter(|org| pred(&org.guid))
            .map(|org| self.org_resource(org, true))
            .collect()
    }

    fn spaces_where(&self, user: &UserGuid, role: SpaceRoleKind) -> Vec<SpaceResource> {
        self.spaces
            .iter()
            .filter(|space| self.space_roles.contains(&(space.guid.clone(), user.clone(), role)))
            .map(Self::space_resource)
            .collect()
    }

    fn summary(&self, user: &UserGuid) -> UserSummary {
        if let Some(summary) = self.summary_overrides.get(user) {
            return summary.clone();
        }

        let holds = |role: OrgRoleKind| {
            move |org: &OrgGuid| self.org_roles.contains(&(org.clone(), user.clone(), role))
        };

        UserSummary {
            organizations: self
                .orgs_where(|org| self.org_members.contains(&(org.clone(), user.clone()))),
            managed_organizations: self.orgs_where(holds(OrgRoleKind::Manager)),
            billing_managed_organizations: self.orgs_where(holds(OrgRoleKind::BillingManager)),
            audited_organizations: self.orgs_where(holds(OrgRoleKind::Auditor)),
            spaces: self.spaces_where(user, SpaceRoleKind::Developer),
            managed_spaces: self.spaces_where(user, SpaceRoleKind::Manager),
            audited_spaces: self.spaces_where(user, SpaceRoleKind::Auditor),
        }
    }
}

fn metadata(guid: &str, collection: &str) -> ResourceMetadata {
    ResourceMetadata { guid: guid.to_owned(), url: format!("/v2/{collection}/{guid}") }
}

fn not_found(kind: &str, code: &str, guid: &str) -> SdkError {
    SdkError::api(404, Some(code), format!("The {kind} could not be found: {guid}"))
}

fn invalid_relation(description: String) -> SdkError {
    SdkError::api(400, Some("CF-InvalidRelation"), description)
}

/// In-memory control-plane deployment.
#[derive(Debug)]
pub struct MockControlPlane {
    api_endpoint: String,
    page_size: usize,
    state: RwLock<DeploymentState>,
    injection: Injection,
    next_guid: AtomicU64,
}

impl MockControlPlane {
    /// Creates an empty deployment reachable at `api_endpoint`.
    pub fn new(api_endpoint: impl Into<String>) -> Self {
        Self {
            api_endpoint: api_endpoint.into(),
            page_size: DEFAULT_PAGE_SIZE,
            state: RwLock::new(DeploymentState::default()),
            injection: Injection::default(),
            next_guid: AtomicU64::new(1),
        }
    }

    /// Sets the number of users returned per listing page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn next_guid(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_guid.fetch_add(1, Ordering::SeqCst))
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    /// Adds an organization. Names are not required to be unique.
    pub fn add_organization(&self, name: &str) -> OrgGuid {
        let guid = OrgGuid::new(self.next_guid("org"));
        self.state
            .write()
            .organizations
            .push(OrgRecord { guid: guid.clone(), name: name.to_owned() });
        guid
    }

    /// Adds a space to an organization.
    pub fn add_space(&self, organization: &OrgGuid, name: &str) -> SpaceGuid {
        let guid = SpaceGuid::new(self.next_guid("space"));
        self.state.write().spaces.push(SpaceRecord {
            guid: guid.clone(),
            name: name.to_owned(),
            organization: organization.clone(),
        });
        guid
    }

    /// Adds a user with a generated id.
    pub fn add_user(&self, username: &str) -> UserGuid {
        let guid = UserGuid::new(self.next_guid("user"));
        self.insert_user(guid.clone(), Some(username));
        guid
    }

    /// Adds a user with a known id, e.g. the id of a directory identity.
    pub fn add_user_with_guid(&self, guid: UserGuid, username: Option<&str>) {
        self.insert_user(guid, username);
    }

    /// Adds a user without a username, like a client principal.
    pub fn add_user_without_username(&self) -> UserGuid {
        let guid = UserGuid::new(self.next_guid("user"));
        self.insert_user(guid.clone(), None);
        guid
    }

    fn insert_user(&self, guid: UserGuid, username: Option<&str>) {
        self.state.write().users.push(UserRecord { guid, username: username.map(str::to_owned) });
    }

    /// Makes a user a plain member of an organization.
    pub fn add_org_member(&self, organization: &OrgGuid, user: &UserGuid) {
        self.state.write().org_members.insert((organization.clone(), user.clone()));
    }

    /// Grants an organization role, adding the membership it requires.
    pub fn assign_org_role(&self, organization: &OrgGuid, user: &UserGuid, role: OrgRoleKind) {
        let mut state = self.state.write();
        state.org_members.insert((organization.clone(), user.clone()));
        state.org_roles.insert((organization.clone(), user.clone(), role));
    }

    /// Grants a space role, adding the organization membership it requires.
    pub fn assign_space_role(&self, space: &SpaceGuid, user: &UserGuid, role: SpaceRoleKind) {
        let mut state = self.state.write();
        if let Some(organization) = state.space(space).map(|s| s.organization.clone()) {
            state.org_members.insert((organization, user.clone()));
        }
        state.space_roles.insert((space.clone(), user.clone(), role));
    }

    /// Serves `summary` verbatim for `user` instead of computing it.
    pub fn set_summary(&self, user: &UserGuid, summary: UserSummary) {
        self.state.write().summary_overrides.insert(user.clone(), summary);
    }

    /// Makes every summary request for `user` fail.
    pub fn fail_summary_for(&self, user: &UserGuid) {
        self.state.write().failing_summaries.insert(user.clone());
    }

    // ------------------------------------------------------------------------
    // Failure injection and counters
    // ------------------------------------------------------------------------

    /// Makes the next `count` calls of `op` fail with `503 Service Unavailable`.
    pub fn inject_failure(&self, op: MockOperation, count: usize) {
        self.injection.inject(op, count);
    }

    /// Returns the number of calls of `op` received.
    pub fn call_count(&self, op: MockOperation) -> usize {
        self.injection.count(op)
    }

    /// Resets all state, counters and injected failures.
    pub fn reset(&self) {
        *self.state.write() = DeploymentState::default();
        self.injection.clear();
        self.next_guid.store(1, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Returns the ids of all users in listing order.
    pub fn users(&self) -> Vec<UserGuid> {
        self.state.read().users.iter().map(|user| user.guid.clone()).collect()
    }

    /// Returns the first organization with `name`.
    pub fn organization_guid(&self, name: &str) -> Option<OrgGuid> {
        self.state
            .read()
            .organizations
            .iter()
            .find(|org| org.name == name)
            .map(|org| org.guid.clone())
    }

    /// Returns the name of `organization`.
    pub fn organization_name(&self, organization: &OrgGuid) -> Option<String> {
        self.state.read().organization(organization).map(|org| org.name.clone())
    }

    /// Returns the owning organization's name and the space's name.
    pub fn space_path(&self, space: &SpaceGuid) -> Option<(String, String)> {
        let state = self.state.read();
        let space = state.space(space)?;
        let org = state.organization(&space.organization)?;
        Some((org.name.clone(), space.name.clone()))
    }

    /// Returns the space named `name` in `organization`.
    pub fn space_guid(&self, organization: &OrgGuid, name: &str) -> Option<SpaceGuid> {
        self.state
            .read()
            .spaces
            .iter()
            .find(|space| &space.organization == organization && space.name == name)
            .map(|space| space.guid.clone())
    }

    /// Returns true if `user` is a member of `organization`.
    pub fn is_org_member(&self, organization: &OrgGuid, user: &UserGuid) -> bool {
        self.state.read().org_members.contains(&(organization.clone(), user.clone()))
    }

    /// Returns the organization roles held by `user`, sorted.
    pub fn org_roles_of(&self, user: &UserGuid) -> Vec<(OrgGuid, OrgRoleKind)> {
        let mut roles: Vec<_> = self
            .state
            .read()
            .org_roles
            .iter()
            .filter(|(_, holder, _)| holder == user)
            .map(|(org, _, role)| (org.clone(), *role))
            .collect();
        roles.sort();
        roles
    }

    /// Returns the space roles held by `user`, sorted.
    pub fn space_roles_of(&self, user: &UserGuid) -> Vec<(SpaceGuid, SpaceRoleKind)> {
        let mut roles: Vec<_> = self
            .state
            .read()
            .space_roles
            .iter()
            .filter(|(_, holder, _)| holder == user)
            .map(|(space, _, role)| (space.clone(), *role))
            .collect();
        roles.sort();
        roles
    }

    fn parse_page_token(&self, next: &str) -> Result<usize> {
        next.strip_prefix(USERS_PAGE_PREFIX)
            .and_then(|rest| rest.split_once("&page="))
            .and_then(|(_, page)| page.parse::<usize>().ok())
            .ok_or_else(|| {
                SdkError::api(400, Some("CF-BadQueryParameter"), format!("bad page {next}"))
            })
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    async fn list_users(&self, next: Option<&str>) -> Result<Page<UserResource>> {
        self.injection.check(MockOperation::ListUsers)?;
        let page = match next {
            Some(next) => self.parse_page_token(next)?,
            None => 1,
        };

        let state = self.state.read();
        let total = state.users.len();
        let items: Vec<UserResource> = state
            .users
            .iter()
            .skip(page.saturating_sub(1) * self.page_size)
            .take(self.page_size)
            .map(|user| Resource {
                metadata: metadata(user.guid.as_str(), "users"),
                entity: UserEntity { admin: false, active: true, username: user.username.clone() },
            })
            .collect();

        let next = (page * self.page_size < total)
            .then(|| format!("{USERS_PAGE_PREFIX}{}&page={}", self.page_size, page + 1));
        Ok(Page { total: total as u64, next, items })
    }

    async fn user_summary(&self, user: &UserGuid) -> Result<UserSummaryResource> {
        self.injection.check(MockOperation::UserSummary)?;
        let state = self.state.read();
        if !state.has_user(user) {
            return Err(not_found("user", "CF-UserNotFound", user.as_str()));
        }
        if state.failing_summaries.contains(user) {
            return Err(SdkError::api(500, Some("UnknownError"), "An unknown error occurred."));
        }

        Ok(Resource { metadata: metadata(user.as_str(), "users"), entity: state.summary(user) })
    }

    async fn find_organizations(&self, name: &str) -> Result<Page<OrgResource>> {
        self.injection.check(MockOperation::FindOrganizations)?;
        let state = self.state.read();
        let items = state
            .organizations
            .iter()
            .filter(|org| org.name == name)
            .map(|org| state.org_resource(org, false))
            .collect();
        Ok(Page::single(items))
    }

    async fn find_spaces(&self, organization: &OrgGuid, name: &str) -> Result<Page<SpaceResource>> {
        self.injection.check(MockOperation::FindSpaces)?;
        let state = self.state.read();
        let items = state
            .spaces
            .iter()
            .filter(|space| &space.organization == organization && space.name == name)
            .map(DeploymentState::space_resource)
            .collect();
        Ok(Page::single(items))
    }

    async fn create_user(&self, user: &UserGuid) -> Result<()> {
        self.injection.check(MockOperation::CreateUser)?;
        let mut state = self.state.write();
        if state.has_user(user) {
            return Err(SdkError::api(
                400,
                Some("CF-UaaIdTaken"),
                format!("The UAA ID is taken: {user}"),
            ));
        }
        state.users.push(UserRecord { guid: user.clone(), username: None });
        Ok(())
    }

    async fn associate_user_with_organization(
        &self,
        organization: &OrgGuid,
        user: &UserGuid,
    ) -> Result<()> {
        self.injection.check(MockOperation::AssociateUser)?;
        let mut state = self.state.write();
        if state.organization(organization).is_none() {
            return Err(not_found("organization", "CF-OrganizationNotFound", organization.as_str()));
        }
        if !state.has_user(user) {
            return Err(invalid_relation(format!("Invalid relation: user {user} does not exist")));
        }
        state.org_members.insert((organization.clone(), user.clone()));
        Ok(())
    }

    async fn grant_organization_role(
        &self,
        organization: &OrgGuid,
        user: &UserGuid,
        role: OrgRoleKind,
    ) -> Result<()> {
        self.injection.check(MockOperation::GrantOrganizationRole)?;
        let mut state = self.state.write();
        if state.organization(organization).is_none() {
            return Err(not_found("organization", "CF-OrganizationNotFound", organization.as_str()));
        }
        if !state.org_members.contains(&(organization.clone(), user.clone())) {
            return Err(invalid_relation(format!(
                "Invalid relation: user {user} is not a member of organization {organization}"
            )));
        }
        state.org_roles.insert((organization.clone(), user.clone(), role));
        Ok(())
    }

    async fn grant_space_role(
        &self,
        space: &SpaceGuid,
        user: &UserGuid,
        role: SpaceRoleKind,
    ) -> Result<()> {
        self.injection.check(MockOperation::GrantSpaceRole)?;
        let mut state = self.state.write();
        let organization = match state.space(space) {
            Some(record) => record.organization.clone(),
            None => return Err(not_found("space", "CF-SpaceNotFound", space.as_str())),
        };
        if !state.org_members.contains(&(organization.clone(), user.clone())) {
            return Err(invalid_relation(format!(
                "Invalid relation: user {user} is not a member of organization {organization}"
            )));
        }
        state.space_roles.insert((space.clone(), user.clone(), role));
        Ok(())
    }
}

// ============================================================================
// Identity directory
// ============================================================================

/// In-memory identity directory.
#[derive(Debug)]
pub struct MockIdentityDirectory {
    identities: RwLock<Vec<ExternalIdentity>>,
    failing_usernames: RwLock<HashSet<String>>,
    injection: Injection,
    next_id: AtomicU64,
}

impl Default for MockIdentityDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            identities: RwLock::new(Vec::new()),
            failing_usernames: RwLock::new(HashSet::new()),
            injection: Injection::default(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Adds an identity with a generated id.
    pub fn add_identity(
        &self,
        username: &str,
        external_id: &str,
        emails: Vec<EmailRecord>,
    ) -> UserGuid {
        let id = UserGuid::new(format!("uaa-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.insert(ExternalIdentity {
            id: id.clone(),
            username: username.to_owned(),
            external_id: external_id.to_owned(),
            emails,
        });
        id
    }

    /// Adds an identity as-is.
    pub fn insert(&self, identity: ExternalIdentity) {
        self.identities.write().push(identity);
    }

    /// Makes every creation of `username` fail.
    pub fn fail_creation_for(&self, username: &str) {
        self.failing_usernames.write().insert(username.to_owned());
    }

    /// Makes the next `count` calls of `op` fail with `503 Service Unavailable`.
    pub fn inject_failure(&self, op: MockOperation, count: usize) {
        self.injection.inject(op, count);
    }

    /// Returns the number of calls of `op` received.
    pub fn call_count(&self, op: MockOperation) -> usize {
        self.injection.count(op)
    }

    /// Returns the identity with `username`, if any.
    pub fn identity(&self, username: &str) -> Option<ExternalIdentity> {
        self.identities.read().iter().find(|identity| identity.username == username).cloned()
    }

    /// Returns every identity in insertion order.
    pub fn identities(&self) -> Vec<ExternalIdentity> {
        self.identities.read().clone()
    }
}

#[async_trait]
impl IdentityDirectory for MockIdentityDirectory {
    async fn list_identities(&self) -> Result<Vec<ExternalIdentity>> {
        self.injection.check(MockOperation::ListIdentities)?;
        Ok(self.identities.read().clone())
    }

    async fn create_identity(&self, identity: &NewIdentity) -> Result<UserGuid> {
        self.injection.check(MockOperation::CreateIdentity)?;
        if self.failing_usernames.read().contains(&identity.username) {
            return Err(SdkError::api(
                400,
                Some("invalid_scim_resource"),
                format!("cannot create {}", identity.username),
            ));
        }
        if self.identity(&identity.username).is_some() {
            return Err(SdkError::api(
                409,
                Some("scim_resource_already_exists"),
                format!("Username already in use: {}", identity.username),
            ));
        }

        Ok(self.add_identity(&identity.username, &identity.external_id, identity.emails.clone()))
    }
}
