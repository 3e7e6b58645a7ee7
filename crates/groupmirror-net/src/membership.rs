//! Bulk member addition.
//!
//! The add endpoint answers with a results id; the added members become
//! readable at `/groups/{id}/members/{results_id}` once the server has
//! processed them.

use async_trait::async_trait;
use uuid::Uuid;

use groupmirror_shared::protocol::{
    AddMembersAccepted, AddMembersRequest, Envelope, MemberResults, MemberWire, NewMemberWire,
};
use groupmirror_shared::{GroupId, UserId};

use crate::context::ApiContext;
use crate::error::SyncError;
use crate::lro::{LongRunningOp, PollVerdict, Submission};
use crate::transport::{ApiRequest, ApiResponse};

/// How the service should find the person being added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberContact {
    UserId(UserId),
    Phone(String),
    Email(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub nickname: String,
    pub contact: MemberContact,
    /// Client-chosen correlation id echoed back in the results.
    pub guid: String,
}

impl NewMember {
    pub fn new(nickname: impl Into<String>, contact: MemberContact) -> Self {
        Self {
            nickname: nickname.into(),
            contact,
            guid: Uuid::new_v4().to_string(),
        }
    }

    pub fn by_user_id(nickname: impl Into<String>, id: impl Into<UserId>) -> Self {
        Self::new(nickname, MemberContact::UserId(id.into()))
    }

    fn to_wire(&self) -> NewMemberWire {
        let mut wire = NewMemberWire {
            nickname: self.nickname.clone(),
            user_id: None,
            phone_number: None,
            email: None,
            guid: self.guid.clone(),
        };
        match &self.contact {
            MemberContact::UserId(id) => wire.user_id = Some(id.to_string()),
            MemberContact::Phone(phone) => wire.phone_number = Some(phone.clone()),
            MemberContact::Email(email) => wire.email = Some(email.clone()),
        }
        wire
    }
}

/// [`LongRunningOp`] adding `members` to `group`.
#[derive(Debug, Clone)]
pub struct MemberAdd {
    pub group: GroupId,
    pub members: Vec<NewMember>,
}

impl MemberAdd {
    pub fn new(group: GroupId, members: Vec<NewMember>) -> Self {
        Self { group, members }
    }
}

#[async_trait]
impl LongRunningOp for MemberAdd {
    type Handle = String;
    type Output = Vec<MemberWire>;

    fn name(&self) -> &'static str {
        "member-add"
    }

    async fn submit_request(&self, ctx: &ApiContext) -> Result<ApiRequest, SyncError> {
        let body = AddMembersRequest {
            members: self.members.iter().map(NewMember::to_wire).collect(),
        };
        let request = ApiRequest::post(ctx.endpoints().members_add(&self.group)).json(&body)?;
        Ok(ctx.authed(request))
    }

    fn accept(
        &self,
        response: &ApiResponse,
    ) -> Result<Submission<String, Vec<MemberWire>>, SyncError> {
        match response.status {
            200..=202 => {
                let accepted: AddMembersAccepted = response.payload("member add")?;
                Ok(Submission::Accepted(accepted.results_id))
            }
            other => Ok(Submission::Rejected(other)),
        }
    }

    fn poll_request(&self, ctx: &ApiContext, results_id: &String) -> ApiRequest {
        ctx.authed(ApiRequest::get(
            ctx.endpoints().member_results(&self.group, results_id),
        ))
    }

    fn classify(&self, response: &ApiResponse) -> Result<PollVerdict<Vec<MemberWire>>, SyncError> {
        Ok(match response.status {
            200 => {
                let envelope: Envelope<MemberResults> = response.json("member results")?;
                PollVerdict::Ready(envelope.response.map(|r| r.members).unwrap_or_default())
            }
            503 => PollVerdict::NotReady,
            404 => PollVerdict::Gone,
            other => PollVerdict::Failed(other),
        })
    }
}
