use ulid::Ulid;

/// Proof that a caller has been verified as an administrator.
///
/// Minted only by `Engine::authorize_admin` after checking the caller's
/// contact against the reservee table. Administrative operations take it by
/// reference — there is no ambient session flag to consult or forget to
/// clear.
#[derive(Debug, Clone)]
pub struct AdminContext {
    reservee_id: Ulid,
}

impl AdminContext {
    pub(crate) fn new(reservee_id: Ulid) -> Self {
        Self { reservee_id }
    }

    /// The administrator this context was issued for, for audit logging.
    pub fn reservee_id(&self) -> Ulid {
        self.reservee_id
    }
}
