use super::body::BodyId;
use super::bvh::BvhId;

use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The body's membership does not allow the requested operation
    ///
    /// Raised by `insert` when the body already belongs to any index, the one asked to insert it
    /// included, and by `remove` or `relocate` when it belongs to some other index or to none.
    /// `owner` is the actual owner at the time of the call (`None` when the body is not a member of
    /// any index).
    Ownership {
        body: BodyId,
        owner: Option<BvhId>
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Error::Ownership{body, owner: Some(owner)} =>
                write!(f, "{:?} belongs to collision system {:?}", body, owner),
            Error::Ownership{body, owner: None} =>
                write!(f, "{:?} does not belong to any collision system", body)
        }
    }
}

impl std::error::Error for Error {}
