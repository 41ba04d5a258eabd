use bytes::Bytes;

/// The result of a successful `post` — constructed only on HTTP status 200.
#[derive(Debug, Clone)]
pub struct Response {
    pub(crate) apns_id: String,
    pub(crate) status: u16,
    pub(crate) body: Bytes,
}

impl Response {
    pub(crate) fn new(apns_id: String, status: u16, body: Bytes) -> Response {
        Response {
            apns_id,
            status,
            body,
        }
    }

    /// The `apns-id` header APNs returned (or generated, if the request omitted one).
    pub fn apns_id(&self) -> &str {
        &self.apns_id
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
