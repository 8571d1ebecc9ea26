use crate::filter::FilterGroup;
use crate::sort::Sort;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<FilterGroup>,
    pub sort: Vec<Sort>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterGroup) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: Vec<Sort>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }
}
