/**
 * HTTP implementation of the property
 *  service over the document content API.
 */
pub mod client;
/**
 * Single property edits driven through a
 *  field controller and the aggregation trigger.
 */
pub mod edit;
/**
 * Subscriber setup for the binary.
 */
pub mod logging;
/**
 * On-disk configuration in ~/.cadmus.
 */
pub mod state;
