//! Debug I/O: conversion between channel buffers and 8-bit images.

mod image;

pub use image::{channels_to_rgb8, rgb8_to_channels};
