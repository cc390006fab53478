use uuid::Uuid;

/// Short opaque identifier, e.g. `job_1a2b3c4d`.
///
/// Eight hex chars of a v4 UUID; callers that need uniqueness must still
/// check the candidate against their table before inserting.
pub(crate) fn short_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &uuid[..8])
}
