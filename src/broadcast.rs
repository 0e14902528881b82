// Tempest Relay - WeatherFlow UDP re-broadcaster
// Copyright (c) 2024 Tempest Relay contributors
//
// Distributed under the terms of the GNU General Public License (GPLv3).
// See LICENSE file for details.

//! Broadcast module
//!
//! This module provides the [`Broadcaster`] trait through which encoded
//! messages leave the relay, a UDP implementation and an in-memory one for
//! tests. Delivery is fire-and-forget: there is no retry and no
//! acknowledgment.

use crate::error::TransmissionError;
use log::debug;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

/// Statistics about broadcaster usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastMetrics {
    /// Datagrams handed to the network
    pub datagrams_sent: u64,
    /// Total payload bytes sent
    pub bytes_sent: u64,
    /// Sends that failed
    pub send_failures: u64,
}

impl BroadcastMetrics {
    fn record(&mut self, result: &Result<(), TransmissionError>, size: usize) {
        match result {
            Ok(()) => {
                self.datagrams_sent += 1;
                self.bytes_sent += size as u64;
            }
            Err(_) => self.send_failures += 1,
        }
    }
}

/// Trait for message sinks
pub trait Broadcaster {
    /// Send one JSON payload as a single datagram
    fn send(&mut self, payload: &str) -> Result<(), TransmissionError>;

    /// Get broadcaster metrics
    fn metrics(&self) -> BroadcastMetrics;
}

/// Send `payload` as one UDP datagram to `address:port`
///
/// A fresh broadcast-enabled socket is opened for the call and released on
/// return, whether or not the send succeeded.
pub fn broadcast(payload: &str, address: &str, port: u16) -> Result<(), TransmissionError> {
    send_datagram(payload.as_bytes(), SocketAddrV4::new(parse_ipv4(address)?, port))
}

fn parse_ipv4(address: &str) -> Result<Ipv4Addr, TransmissionError> {
    address
        .trim()
        .parse()
        .map_err(|_| TransmissionError::InvalidAddress(address.to_string()))
}

fn send_datagram(bytes: &[u8], destination: SocketAddrV4) -> Result<(), TransmissionError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .map_err(|source| TransmissionError::Bind { source })?;
    socket
        .set_broadcast(true)
        .map_err(|source| TransmissionError::Broadcast { source })?;
    socket
        .send_to(bytes, destination)
        .map_err(|source| TransmissionError::Send {
            addr: destination.to_string(),
            source,
        })?;
    Ok(())
}

/// UDP broadcaster bound to one destination
#[derive(Debug, Clone)]
pub struct UdpBroadcaster {
    destination: SocketAddrV4,
    metrics: BroadcastMetrics,
}

impl UdpBroadcaster {
    /// Create a broadcaster for `address:port`
    ///
    /// # Errors
    ///
    /// Returns [`TransmissionError::InvalidAddress`] if `address` is not an
    /// IPv4 address.
    pub fn new(address: &str, port: u16) -> Result<Self, TransmissionError> {
        let ip = parse_ipv4(address)?;
        Ok(Self::with_destination(SocketAddrV4::new(ip, port)))
    }

    /// Create a broadcaster for a resolved destination
    pub fn with_destination(destination: SocketAddrV4) -> Self {
        Self {
            destination,
            metrics: BroadcastMetrics::default(),
        }
    }

    /// Destination of every datagram
    pub fn destination(&self) -> SocketAddrV4 {
        self.destination
    }
}

impl Broadcaster for UdpBroadcaster {
    fn send(&mut self, payload: &str) -> Result<(), TransmissionError> {
        debug!("Broadcasting {} bytes to {}", payload.len(), self.destination);
        let result = send_datagram(payload.as_bytes(), self.destination);
        self.metrics.record(&result, payload.len());
        result
    }

    fn metrics(&self) -> BroadcastMetrics {
        self.metrics.clone()
    }
}

/// A broadcaster that keeps payloads in memory
#[derive(Debug)]
pub struct MemoryBroadcaster {
    /// Sent payloads, oldest first
    sent: VecDeque<String>,
    /// Whether the broadcaster accepts payloads
    is_open: bool,
    metrics: BroadcastMetrics,
}

impl MemoryBroadcaster {
    /// Create a new memory broadcaster
    pub fn new() -> Self {
        Self {
            sent: VecDeque::new(),
            is_open: true,
            metrics: BroadcastMetrics::default(),
        }
    }

    /// Pop the oldest sent payload
    pub fn pop_sent(&mut self) -> Option<String> {
        self.sent.pop_front()
    }

    /// Sent payloads, oldest first
    pub fn sent(&self) -> impl Iterator<Item = &str> {
        self.sent.iter().map(String::as_str)
    }

    /// Number of payloads waiting to be popped
    pub fn pending(&self) -> usize {
        self.sent.len()
    }

    /// Make every following send fail
    pub fn close(&mut self) {
        self.is_open = false;
    }

    /// Accept payloads again
    pub fn reopen(&mut self) {
        self.is_open = true;
    }
}

impl Default for MemoryBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for MemoryBroadcaster {
    fn send(&mut self, payload: &str) -> Result<(), TransmissionError> {
        let result = if self.is_open {
            self.sent.push_back(payload.to_string());
            Ok(())
        } else {
            Err(TransmissionError::Closed)
        };
        self.metrics.record(&result, payload.len());
        result
    }

    fn metrics(&self) -> BroadcastMetrics {
        self.metrics.clone()
    }
}

impl<B: Broadcaster + ?Sized> Broadcaster for Box<B> {
    fn send(&mut self, payload: &str) -> Result<(), TransmissionError> {
        (**self).send(payload)
    }

    fn metrics(&self) -> BroadcastMetrics {
        (**self).metrics()
    }
}
