mod fakes;
mod refresh;
mod remote;
