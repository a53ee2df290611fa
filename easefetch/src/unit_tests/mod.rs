use crate::mock::MockFetcher;
use crate::{FetchController, FetchError};

mod fetch_error_test;
mod stream_ext_test;

#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub a: i32,
    pub b: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Picked {
    pub c: i32,
}

pub fn point_fetcher() -> MockFetcher<Point> {
    MockFetcher::returning(Ok(Point { a: 1, b: 2 }))
}

pub fn failing_fetcher(error: FetchError) -> MockFetcher<Point> {
    MockFetcher::returning(Err(error))
}

pub fn pick_c(point: Point) -> Picked {
    Picked { c: point.a }
}

pub type PointController = FetchController<(), Point, Point>;
