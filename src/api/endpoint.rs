//! Endpoint descriptors for the archive server API.
//!
//! Each operation kind is described once by an HTTP method and a path
//! template. Templates use `{}` positional placeholders that are filled in
//! order by [`Endpoint::path`]; every argument is percent-encoded.

/// HTTP method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// A stateless endpoint descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    method: HttpMethod,
    template: &'static str,
}

impl Endpoint {
    const fn new(method: HttpMethod, template: &'static str) -> Self {
        Self { method, template }
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the raw path template.
    #[must_use]
    pub fn template(&self) -> &'static str {
        self.template
    }

    /// Substitutes the positional placeholders with `args`, in order.
    ///
    /// Missing arguments leave the remaining placeholders empty; surplus
    /// arguments are ignored.
    #[must_use]
    pub fn path(&self, args: &[&str]) -> String {
        let mut out = String::with_capacity(self.template.len() + 16);
        let mut args = args.iter();
        let mut rest = self.template;
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            if let Some(arg) = args.next() {
                out.push_str(&urlencoding::encode(arg));
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}

pub const SERVER_INFO: Endpoint = Endpoint::new(HttpMethod::Get, "/api/info");
pub const ARCHIVE_LIST: Endpoint = Endpoint::new(HttpMethod::Get, "/api/archives");
pub const ARCHIVE_METADATA: Endpoint = Endpoint::new(HttpMethod::Get, "/api/archives/{}/metadata");
pub const ARCHIVE_DELETE: Endpoint = Endpoint::new(HttpMethod::Delete, "/api/archives/{}");
pub const ARCHIVE_CLEAR_NEW: Endpoint = Endpoint::new(HttpMethod::Delete, "/api/archives/{}/isnew");
pub const ARCHIVE_PROGRESS: Endpoint =
    Endpoint::new(HttpMethod::Put, "/api/archives/{}/progress/{}");
pub const ARCHIVE_SET_THUMBNAIL: Endpoint =
    Endpoint::new(HttpMethod::Put, "/api/archives/{}/thumbnail");
pub const ARCHIVE_EXTRACT: Endpoint = Endpoint::new(HttpMethod::Post, "/api/archives/{}/extract");
pub const ARCHIVE_THUMBNAIL: Endpoint =
    Endpoint::new(HttpMethod::Get, "/api/archives/{}/thumbnail");
pub const SEARCH: Endpoint = Endpoint::new(HttpMethod::Get, "/api/search");
pub const SEARCH_RANDOM: Endpoint = Endpoint::new(HttpMethod::Get, "/api/search/random");
pub const CATEGORY_LIST: Endpoint = Endpoint::new(HttpMethod::Get, "/api/categories");
pub const CATEGORY_CREATE: Endpoint = Endpoint::new(HttpMethod::Put, "/api/categories");
pub const CATEGORY_DELETE: Endpoint = Endpoint::new(HttpMethod::Delete, "/api/categories/{}");
pub const CATEGORY_ADD_ARCHIVE: Endpoint =
    Endpoint::new(HttpMethod::Put, "/api/categories/{}/{}");
pub const CATEGORY_REMOVE_ARCHIVE: Endpoint =
    Endpoint::new(HttpMethod::Delete, "/api/categories/{}/{}");
pub const TEMP_FOLDER_CLEAR: Endpoint = Endpoint::new(HttpMethod::Delete, "/api/tempfolder");
pub const DATABASE_STATS: Endpoint = Endpoint::new(HttpMethod::Get, "/api/database/stats");
pub const JOB_STATUS: Endpoint = Endpoint::new(HttpMethod::Get, "/api/minion/{}");
