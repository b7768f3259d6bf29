//! Database service layer
//!
//! This module provides a high-level interface to database operations

use uuid::Uuid;

use crate::database::{
    AdminRepository, DatabasePool, EventRepository, ModifyRequestRepository, OrganizationRepository,
    PaymentProductRepository, TeamRepository, UserRepository, VolunteerRepository,
};
use crate::models::admin::AdminConfiguration;
use crate::models::common::FileObject;
use crate::models::organization::{OrganizationCertification, OrganizationDocument};
use crate::models::user::{CreateUserRequest, User, UserStatus, UserTitle};
use crate::utils::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pool: DatabasePool,
    pub users: UserRepository,
    pub modify_requests: ModifyRequestRepository,
    pub admin: AdminRepository,
    pub organizations: OrganizationRepository,
    pub events: EventRepository,
    pub products: PaymentProductRepository,
    pub teams: TeamRepository,
    pub volunteers: VolunteerRepository,
}

/// A new organization account with the certificates uploaded for it
#[derive(Debug, Clone)]
pub struct OrganizationRegistration {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub username: String,
    pub password_hash: String,
    /// Email of the administrator approving the organization
    pub administrator: String,
    pub documents: Vec<(OrganizationDocument, FileObject)>,
}

/// Aggregate numbers shown on an event overview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventCounts {
    pub team_count: i64,
    pub product_count: i64,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            modify_requests: ModifyRequestRepository::new(pool.clone()),
            admin: AdminRepository::new(pool.clone()),
            organizations: OrganizationRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            products: PaymentProductRepository::new(pool.clone()),
            teams: TeamRepository::new(pool.clone()),
            volunteers: VolunteerRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Register an organization account awaiting approval together with its
    /// certification and any documents already uploaded, in one transaction.
    ///
    /// A duplicate email is answered as `Forbidden("email already registered")`.
    pub async fn register_organization(
        &self,
        registration: OrganizationRegistration,
    ) -> Result<(User, OrganizationCertification)> {
        let mut tx = self.pool.begin().await?;

        let user = UserRepository::insert(
            &mut tx,
            registration.id,
            CreateUserRequest {
                email: registration.email,
                name: registration.name,
                username: registration.username,
                title: UserTitle::Organization,
                status: UserStatus::NeedsApproval,
                password_hash: Some(registration.password_hash),
                affiliation: Some(registration.administrator),
                sso_uid: None,
            },
        )
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                AppError::forbidden("email already registered")
            } else {
                e
            }
        })?;

        let mut certification = OrganizationRepository::insert_certification(&mut tx, &user.email).await?;
        for (document, file) in registration.documents {
            certification = OrganizationRepository::update_document(&mut tx, &user.email, document, file).await?;
        }

        tx.commit().await?;
        Ok((user, certification))
    }

    /// Get an administrator's configuration, creating the default one when missing
    pub async fn ensure_admin_configuration(&self, affiliation: &str) -> Result<AdminConfiguration> {
        if let Some(config) = self.admin.find_configuration(affiliation).await? {
            return Ok(config);
        }

        tracing::info!(affiliation = %affiliation, "Creating default admin configuration");
        self.admin
            .create_configuration(affiliation, AdminConfiguration::default_gateways())
            .await
    }

    /// Create a team account under an organization and attach it to an event
    pub async fn create_team(&self, organization: &User, name: &str, event_id: Uuid) -> Result<User> {
        let team = self
            .users
            .create(CreateUserRequest {
                email: format!("team-{}-{}", Uuid::new_v4().simple(), organization.email),
                name: name.to_string(),
                username: name.to_string(),
                title: UserTitle::Team,
                status: UserStatus::NeedsApproval,
                password_hash: None,
                affiliation: Some(organization.email.clone()),
                sso_uid: None,
            })
            .await?;

        self.teams
            .create(team.id, organization.affiliation.as_deref(), &organization.email, event_id)
            .await?;

        Ok(team)
    }

    /// Real aggregates for an event
    pub async fn event_counts(&self, event_id: Uuid) -> Result<EventCounts> {
        Ok(EventCounts {
            team_count: self.events.team_count(event_id).await?,
            product_count: self.events.product_count(event_id).await?,
        })
    }
}
