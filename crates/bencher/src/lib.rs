/// A request to resolve, and how expensive it is expected to be.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    method: &'static str,
    path: &'static str,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, method: &'static str, path: &'static str) -> Self {
        Self { name, group, method, path }
    }

    pub fn small(name: &'static str, method: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Small, method, path)
    }

    pub fn normal(name: &'static str, method: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Normal, method, path)
    }

    pub fn large(name: &'static str, method: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Large, method, path)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

/// A body written through the payload encoders.
#[derive(Debug, Copy, Clone)]
pub struct TestBody {
    name: &'static str,
    size: usize,
    chunk_size: usize,
}

impl TestBody {
    pub const fn new(name: &'static str, size: usize, chunk_size: usize) -> Self {
        Self { name, size, chunk_size }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunks(&self) -> usize {
        self.size.div_ceil(self.chunk_size)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

/// Routes of a mid-sized api, as `(method, path)`.
pub static API_ROUTES: &[(&str, &str)] = &[
    ("GET", "/"),
    ("GET", "/health"),
    ("GET", "/api/v1/users"),
    ("POST", "/api/v1/users"),
    ("GET", "/api/v1/users/{id:\\d+}"),
    ("PUT", "/api/v1/users/{id:\\d+}"),
    ("DELETE", "/api/v1/users/{id:\\d+}"),
    ("GET", "/api/v1/users/{id:\\d+}/posts"),
    ("GET", "/api/v1/users/{id:\\d+}/posts/{slug}"),
    ("GET", "/api/v1/orgs/{org}/repos/{repo}"),
    ("GET", "/api/v1/orgs/{org}/repos/{repo}/issues/{number:\\d+}"),
    ("POST", "/api/v1/orgs/{org}/repos/{repo}/issues"),
    ("GET", "/api/v1/search"),
    ("*", "/api/v1/echo"),
];
