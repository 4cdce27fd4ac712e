//! Update User Roles Use Case
//!
//! Replaces a user's role set on behalf of an acting user and regenerates the
//! user code from the highest new role.

use std::sync::Arc;

use kernel::id::UserId;

use crate::domain::entity::User;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{Role, RoleHierarchy, UserCode};
use crate::error::{IdentityError, IdentityResult};

/// Update roles input
pub struct UpdateRolesInput {
    pub acting_user_id: UserId,
    pub target_user_id: UserId,
    /// Role codes as supplied by the caller, e.g. `["agent", "buyer"]`
    pub roles: Vec<String>,
}

/// Update roles output
#[derive(Debug, Clone)]
pub struct UpdateRolesOutput {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub user_code: UserCode,
}

/// Update user roles use case
pub struct UpdateRolesUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
}

impl<U> UpdateRolesUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }

    pub async fn execute(&self, input: UpdateRolesInput) -> IdentityResult<UpdateRolesOutput> {
        let acting = self
            .user_repo
            .find_by_id(&input.acting_user_id)
            .await?
            .ok_or(IdentityError::UserNotFound)?;

        let acting_role = acting
            .highest_role()
            .filter(Role::is_role_manager)
            .ok_or_else(|| {
                tracing::warn!(user_id = %acting.user_id, "Role update attempted without authority");
                IdentityError::RoleAssignmentDenied(
                    "You do not have permission to update user roles".to_string(),
                )
            })?;

        let roles = parse_assignable(acting_role, &input.roles)?;

        let target = self
            .user_repo
            .find_by_id(&input.target_user_id)
            .await?
            .ok_or(IdentityError::UserNotFound)?;

        let user_code = self.next_user_code(&target, &roles).await?;

        if !self
            .user_repo
            .update_roles(&target.user_id, &roles, &user_code)
            .await?
        {
            return Err(IdentityError::UserNotFound);
        }

        tracing::info!(
            user_id = %target.user_id,
            acting_user_id = %acting.user_id,
            user_code = %user_code,
            "User roles updated"
        );

        Ok(UpdateRolesOutput {
            user_id: target.user_id,
            roles,
            user_code,
        })
    }

    async fn next_user_code(&self, target: &User, roles: &[Role]) -> IdentityResult<UserCode> {
        let prefix = UserCode::prefix_for(RoleHierarchy::highest(roles));
        let country = UserCode::country_code(&target.country);
        let number = self
            .user_repo
            .next_user_code_number(prefix, &country)
            .await?;
        Ok(UserCode::new(prefix, number, &country))
    }
}

/// Parse role codes and check each against the acting role. Duplicates are
/// dropped, first occurrence kept.
fn parse_assignable(acting: Role, codes: &[String]) -> IdentityResult<Vec<Role>> {
    if codes.is_empty() {
        return Err(IdentityError::Validation(
            "At least one role is required".to_string(),
        ));
    }

    let mut roles = Vec::with_capacity(codes.len());
    for code in codes {
        let role: Role = code.trim().parse()?;
        if !acting.can_assign(role) {
            return Err(IdentityError::RoleAssignmentDenied(format!(
                "You cannot assign role: {}",
                role
            )));
        }
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    Ok(roles)
}
