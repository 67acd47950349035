//! Shop-scope authorization

use super::types::AccessToken;
use crate::error::{Error, Result};

/// Check that `token` may operate on `shop_id`.
///
/// A shop id of 0 means "no shop specified" and is always allowed. Anything
/// else must be in the token's granted scope; otherwise the request fails
/// here, before it spends a rate-limit permit or a retry.
pub fn check_authorized(token: &AccessToken, shop_id: u64) -> Result<()> {
    if shop_id == 0 || token.grants(shop_id) {
        Ok(())
    } else {
        Err(Error::Unauthorized { shop_id })
    }
}
